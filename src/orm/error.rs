use std::fmt;

/// Errors raised while building model metadata or manipulating instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrmError {
    /// A value was assigned to a name the model does not declare.
    UnknownField { model: String, field: String },
    /// The same field name was declared twice.
    DuplicateField { model: String, field: String },
    /// A model must declare exactly one primary key.
    MissingPrimaryKey { model: String },
    MultiplePrimaryKeys { model: String },
    /// A relation operation targeted a data field.
    NotARelation { model: String, field: String },
    /// The relation loader failed to materialize a relation.
    Loader {
        model: String,
        relation: String,
        message: String,
    },
    /// A typed model could not be converted to or from an instance.
    Conversion { model: String, message: String },
}

impl fmt::Display for OrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrmError::UnknownField { model, field } => {
                write!(f, "{model} has no field named '{field}'")
            }
            OrmError::DuplicateField { model, field } => {
                write!(f, "{model} declares field '{field}' more than once")
            }
            OrmError::MissingPrimaryKey { model } => {
                write!(f, "{model} does not declare a primary key field")
            }
            OrmError::MultiplePrimaryKeys { model } => {
                write!(f, "{model} declares more than one primary key field")
            }
            OrmError::NotARelation { model, field } => {
                write!(f, "{model}.{field} is not a relational field")
            }
            OrmError::Loader {
                model,
                relation,
                message,
            } => write!(f, "failed to load {model}.{relation}: {message}"),
            OrmError::Conversion { model, message } => {
                write!(f, "failed to convert {model}: {message}")
            }
        }
    }
}

impl std::error::Error for OrmError {}
