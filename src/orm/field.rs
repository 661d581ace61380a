use serde_json::Value;

/// Storage type of a non-relational field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Int,
    BigInt,
    Float,
    /// Fixed precision decimal, exchanged as a string to avoid float rounding
    Decimal,
    Bool,
    Text { max_length: Option<usize> },
    Uuid,
    Date,
    DateTime,
    Json,
}

/// Classification of a model field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Data(DataType),
    /// Forward many-to-one relation to `to`
    ForeignKey { to: String },
    OneToOne { to: String },
    ManyToMany { to: String },
    /// Backward side of a relation declared on `from`
    ReverseRelation { from: String },
}

impl FieldKind {
    /// Short label used in logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Data(_) => "data",
            FieldKind::ForeignKey { .. } => "fk",
            FieldKind::OneToOne { .. } => "o2o",
            FieldKind::ManyToMany { .. } => "m2m",
            FieldKind::ReverseRelation { .. } => "reverse",
        }
    }
}

/// Field metadata as exposed by the ORM.
#[derive(Debug, Clone, PartialEq)]
pub struct OrmField {
    pub name: String,
    pub kind: FieldKind,
    pub pk: bool,
    pub null: bool,
    /// Value produced by the database (auto-increment keys, timestamps)
    pub generated: bool,
    pub read_only: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl OrmField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        OrmField {
            name: name.into(),
            kind,
            pk: false,
            null: false,
            generated: false,
            read_only: false,
            default: None,
            description: None,
        }
    }

    pub fn data(name: impl Into<String>, ty: DataType) -> Self {
        Self::new(name, FieldKind::Data(ty))
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::data(name, DataType::Int)
    }

    pub fn big_int(name: impl Into<String>) -> Self {
        Self::data(name, DataType::BigInt)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::data(name, DataType::Float)
    }

    pub fn decimal(name: impl Into<String>) -> Self {
        Self::data(name, DataType::Decimal)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::data(name, DataType::Bool)
    }

    pub fn text(name: impl Into<String>, max_length: Option<usize>) -> Self {
        Self::data(name, DataType::Text { max_length })
    }

    pub fn uuid(name: impl Into<String>) -> Self {
        Self::data(name, DataType::Uuid)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::data(name, DataType::Date)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::data(name, DataType::DateTime)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::data(name, DataType::Json)
    }

    pub fn foreign_key(name: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(name, FieldKind::ForeignKey { to: to.into() })
    }

    pub fn one_to_one(name: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(name, FieldKind::OneToOne { to: to.into() })
    }

    pub fn many_to_many(name: impl Into<String>, to: impl Into<String>) -> Self {
        // m2m sets are never required on create
        let mut field = Self::new(name, FieldKind::ManyToMany { to: to.into() });
        field.default = Some(Value::Array(Vec::new()));
        field
    }

    pub fn reverse_relation(name: impl Into<String>, from: impl Into<String>) -> Self {
        let mut field = Self::new(name, FieldKind::ReverseRelation { from: from.into() });
        field.read_only = true;
        field
    }

    #[must_use]
    pub fn pk(mut self) -> Self {
        self.pk = true;
        self
    }

    #[must_use]
    pub fn null(mut self) -> Self {
        self.null = true;
        self
    }

    #[must_use]
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// A value must be supplied on create: no default, not nullable and not
    /// produced by the database. Reverse relations are never supplied.
    #[must_use]
    pub fn required(&self) -> bool {
        !self.is_reverse_relation() && self.default.is_none() && !self.null && !self.generated
    }

    /// Forward relations (foreign key, one-to-one, many-to-many).
    #[must_use]
    pub fn is_relational(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::ForeignKey { .. } | FieldKind::OneToOne { .. } | FieldKind::ManyToMany { .. }
        )
    }

    #[must_use]
    pub fn is_reverse_relation(&self) -> bool {
        matches!(self.kind, FieldKind::ReverseRelation { .. })
    }

    /// Relational in either direction.
    #[must_use]
    pub fn is_relation(&self) -> bool {
        self.is_relational() || self.is_reverse_relation()
    }

    /// Model name on the other side of a relation.
    #[must_use]
    pub fn related_model(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::ForeignKey { to }
            | FieldKind::OneToOne { to }
            | FieldKind::ManyToMany { to } => Some(to),
            FieldKind::ReverseRelation { from } => Some(from),
            FieldKind::Data(_) => None,
        }
    }

    /// Relations that hold many related objects.
    #[must_use]
    pub fn is_to_many(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::ManyToMany { .. } | FieldKind::ReverseRelation { .. }
        )
    }

    /// Column holding the raw id of a single-object forward relation.
    #[must_use]
    pub fn source_field(&self) -> Option<String> {
        match self.kind {
            FieldKind::ForeignKey { .. } | FieldKind::OneToOne { .. } => {
                Some(format!("{}_id", self.name))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_follows_orm_semantics() {
        assert!(OrmField::text("name", None).required());
        assert!(!OrmField::text("nick", None).null().required());
        assert!(!OrmField::int("id").pk().generated().required());
        assert!(!OrmField::boolean("active").default_value(true).required());
    }

    #[test]
    fn test_relation_classification() {
        let fk = OrmField::foreign_key("owner", "User");
        assert!(fk.is_relational());
        assert!(!fk.is_to_many());
        assert_eq!(fk.source_field().as_deref(), Some("owner_id"));

        let rev = OrmField::reverse_relation("events", "Event");
        assert!(rev.is_reverse_relation());
        assert!(rev.is_to_many());
        assert!(rev.read_only);
        assert_eq!(rev.related_model(), Some("Event"));

        let m2m = OrmField::many_to_many("tags", "Tag");
        assert!(!m2m.required());
        assert!(m2m.source_field().is_none());
    }
}
