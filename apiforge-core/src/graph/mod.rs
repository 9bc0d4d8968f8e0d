use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// The resolved application model. Owns every entity exclusively.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityGraph {
    pub app: AppInfo,
    /// Opaque generator options carried through from the document.
    pub options: IndexMap<String, Value>,
    entities: IndexMap<String, Entity>,
    #[serde(skip)]
    dependencies: HashMap<String, Vec<Dependency>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub backend: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub name: String,
    pub table_name: String,
    pub description: String,
    pub fields: Vec<Field>,
    pub relationships: Vec<Relationship>,
    pub composite_primary_key: Option<Vec<String>>,
    pub indexes: Vec<Index>,
    pub audit: bool,
    pub soft_delete: bool,
    /// action -> roles allowed to perform it
    pub permissions: IndexMap<String, BTreeSet<String>>,
    pub endpoints: Option<EndpointConfig>,
    pub seed: Vec<serde_json::Map<String, Value>>,
    pub business_rules: Vec<String>,
    pub security_notes: Vec<String>,
    pub origin: EntityOrigin,
    pub explicit: EntityExplicit,
}

/// Entity-level attributes stated in the source document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityExplicit {
    pub soft_delete: bool,
    pub business_rules: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EntityOrigin {
    Declared,
    /// Join entity created for a many-to-many relationship without `via`.
    SynthesizedJoin { left: String, right: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub primary: bool,
    pub auto_increment: bool,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<String>>,
    pub foreign_key: Option<ForeignKey>,
    pub pattern: Option<String>,
    pub max_length: Option<u64>,
    pub precision: Option<u64>,
    pub scale: Option<u64>,
    pub format: Option<String>,
    pub description: Option<String>,
    pub sensitive: bool,
    /// Presentation hints, never interpreted here.
    pub frontend: Option<Value>,
    pub explicit: Explicit,
}

/// Field attributes stated in the source document. Enrichment never touches these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Explicit {
    pub nullable: bool,
    pub unique: bool,
    pub description: bool,
    pub sensitive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "bigint")]
    BigInt,
    #[serde(rename = "uuid")]
    Uuid,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "decimal")]
    Decimal,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    #[serde(rename = "time")]
    Time,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "uuid[]")]
    UuidArray,
    #[serde(rename = "string[]")]
    StringArray,
}

impl FieldType {
    /// Every accepted type token, in the order they are reported to users.
    pub const NAMES: &'static [&'static str] = &[
        "string", "text", "int", "bigint", "uuid", "boolean", "decimal", "float", "date",
        "datetime", "time", "json", "uuid[]", "string[]",
    ];

    pub fn parse(token: &str) -> Option<Self> {
        let ty = match token.trim().to_ascii_lowercase().as_str() {
            "string" => FieldType::String,
            "text" => FieldType::Text,
            "int" => FieldType::Int,
            "bigint" => FieldType::BigInt,
            "uuid" => FieldType::Uuid,
            "boolean" => FieldType::Boolean,
            "decimal" => FieldType::Decimal,
            "float" => FieldType::Float,
            "date" => FieldType::Date,
            "datetime" => FieldType::DateTime,
            "time" => FieldType::Time,
            "json" | "jsonb" => FieldType::Json,
            "uuid[]" => FieldType::UuidArray,
            "string[]" => FieldType::StringArray,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Int => "int",
            FieldType::BigInt => "bigint",
            FieldType::Uuid => "uuid",
            FieldType::Boolean => "boolean",
            FieldType::Decimal => "decimal",
            FieldType::Float => "float",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Time => "time",
            FieldType::Json => "json",
            FieldType::UuidArray => "uuid[]",
            FieldType::StringArray => "string[]",
        }
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::String | FieldType::Text)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub entity: String,
    pub field: String,
    pub on_delete: DeletePolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DeletePolicy {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    #[default]
    NoAction,
}

impl DeletePolicy {
    pub fn parse(token: &str) -> Option<Self> {
        let normalized = token.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        let policy = match normalized.as_str() {
            "cascade" => DeletePolicy::Cascade,
            "set null" => DeletePolicy::SetNull,
            "set default" => DeletePolicy::SetDefault,
            "restrict" => DeletePolicy::Restrict,
            "no action" => DeletePolicy::NoAction,
            _ => return None,
        };
        Some(policy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    pub name: String,
    pub kind: RelationshipKind,
    pub target: String,
    pub local_field: Option<String>,
    pub remote_field: Option<String>,
    /// Join entity for many-to-many
    pub via: Option<String>,
    pub cascade: Option<String>,
    pub inverse: Option<String>,
    pub eager_load: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelationshipKind {
    ManyToOne,
    OneToMany,
    ManyToMany,
    OneToOne,
    SelfReferencing,
}

impl RelationshipKind {
    pub const NAMES: &'static [&'static str] = &[
        "many-to-one",
        "one-to-many",
        "many-to-many",
        "one-to-one",
        "self-referencing",
    ];

    pub fn parse(token: &str) -> Option<Self> {
        let kind = match token.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "many-to-one" => RelationshipKind::ManyToOne,
            "one-to-many" => RelationshipKind::OneToMany,
            "many-to-many" => RelationshipKind::ManyToMany,
            "one-to-one" => RelationshipKind::OneToOne,
            "self-referencing" => RelationshipKind::SelfReferencing,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::ManyToOne => "many-to-one",
            RelationshipKind::OneToMany => "one-to-many",
            RelationshipKind::ManyToMany => "many-to-many",
            RelationshipKind::OneToOne => "one-to-one",
            RelationshipKind::SelfReferencing => "self-referencing",
        }
    }

    /// Kinds whose local field holds a reference to the remote side.
    pub fn owns_reference(&self) -> bool {
        matches!(
            self,
            RelationshipKind::ManyToOne
                | RelationshipKind::OneToOne
                | RelationshipKind::SelfReferencing
        )
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Index {
    pub name: Option<String>,
    pub fields: Vec<String>,
    pub unique: bool,
    pub origin: IndexOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexOrigin {
    Explicit,
    /// Implied by a `unique` field.
    UniqueConstraint,
    Suggested,
    /// Plain index over a reference column.
    ForeignKey,
}

impl Index {
    /// Field-set identity used for de-duplication.
    pub fn key(&self) -> BTreeSet<&str> {
        self.fields.iter().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EndpointConfig {
    pub base_path: String,
    pub crud: bool,
    pub search_fields: Vec<String>,
    pub bulk: BulkOperations,
    pub extra: IndexMap<String, ExtraOperation>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOperations {
    #[serde(default, deserialize_with = "null_as_default")]
    pub create: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub update: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub delete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraOperation {
    pub method: String,
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub auth: bool,
}

/// `null` decodes like an absent key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A foreign-key edge from an entity to the entity it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub target: String,
    pub field: String,
    /// A non-nullable reference; constrains creation order.
    pub required: bool,
}

impl EntityGraph {
    pub fn new(app: AppInfo) -> Self {
        EntityGraph {
            app,
            options: IndexMap::new(),
            entities: IndexMap::new(),
            dependencies: HashMap::new(),
        }
    }

    /// Insert an entity, replacing any previous one with the same name.
    pub fn add_entity(&mut self, entity: Entity) {
        self.dependencies
            .insert(entity.name.clone(), entity.dependencies());
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn get_entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Entities in document order (synthesized join entities last).
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entities.get_index_of(name)
    }

    pub fn dependencies(&self, name: &str) -> &[Dependency] {
        self.dependencies
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn join_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities().filter(|e| e.is_synthesized_join())
    }

    /// Rebuild the graph around a new set of entities, keeping app info and options.
    pub fn with_entities(&self, entities: Vec<Entity>) -> Self {
        let mut graph = EntityGraph {
            app: self.app.clone(),
            options: self.options.clone(),
            entities: IndexMap::new(),
            dependencies: HashMap::new(),
        };
        for entity in entities {
            graph.add_entity(entity);
        }
        graph
    }
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Entity {
            table_name: crate::naming::entity_to_table(&name),
            name,
            description: String::new(),
            fields: Vec::new(),
            relationships: Vec::new(),
            composite_primary_key: None,
            indexes: Vec::new(),
            audit: false,
            soft_delete: false,
            permissions: IndexMap::new(),
            endpoints: None,
            seed: Vec::new(),
            business_rules: Vec::new(),
            security_notes: Vec::new(),
            origin: EntityOrigin::Declared,
            explicit: EntityExplicit::default(),
        }
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn add_relationship(&mut self, relationship: Relationship) {
        self.relationships.push(relationship);
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// The key fields: the composite key if declared, else every `primary` field.
    pub fn primary_key(&self) -> Vec<&str> {
        match &self.composite_primary_key {
            Some(fields) => fields.iter().map(String::as_str).collect(),
            None => self
                .fields
                .iter()
                .filter(|f| f.primary)
                .map(|f| f.name.as_str())
                .collect(),
        }
    }

    /// The primary key field, when the entity is keyed by exactly one field.
    pub fn single_primary_key(&self) -> Option<&Field> {
        if self.composite_primary_key.is_some() {
            return None;
        }
        let mut primaries = self.fields.iter().filter(|f| f.primary);
        match (primaries.next(), primaries.next()) {
            (Some(field), None) => Some(field),
            _ => None,
        }
    }

    pub fn is_synthesized_join(&self) -> bool {
        matches!(self.origin, EntityOrigin::SynthesizedJoin { .. })
    }

    /// Foreign-key edges declared by this entity, in field order.
    ///
    /// A belongs-to style relationship whose local field carries no foreign-key
    /// descriptor still counts as an edge, with the local field's nullability.
    pub fn dependencies(&self) -> Vec<Dependency> {
        let mut deps: Vec<Dependency> = self
            .fields
            .iter()
            .filter_map(|field| {
                field.foreign_key.as_ref().map(|fk| Dependency {
                    target: fk.entity.clone(),
                    field: field.name.clone(),
                    required: !field.nullable,
                })
            })
            .collect();

        for relationship in &self.relationships {
            if !relationship.kind.owns_reference() {
                continue;
            }
            let Some(local) = relationship.local_field.as_deref() else {
                continue;
            };
            if deps.iter().any(|d| d.field == local) {
                continue;
            }
            if let Some(field) = self.get_field(local) {
                deps.push(Dependency {
                    target: relationship.target.clone(),
                    field: field.name.clone(),
                    required: !field.nullable,
                });
            }
        }

        deps
    }
}

impl Field {
    /// A nullable, non-unique field with nothing declared explicitly.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Field {
            name: name.into(),
            field_type,
            primary: false,
            auto_increment: false,
            nullable: true,
            unique: false,
            default: None,
            enum_values: None,
            foreign_key: None,
            pattern: None,
            max_length: None,
            precision: None,
            scale: None,
            format: None,
            description: None,
            sensitive: false,
            frontend: None,
            explicit: Explicit::default(),
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.nullable = false;
        self
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self.explicit.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self.explicit.unique = true;
        self
    }

    pub fn references(mut self, entity: impl Into<String>, field: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            entity: entity.into(),
            field: field.into(),
            on_delete: DeletePolicy::default(),
        });
        self
    }
}

impl Relationship {
    pub fn new(
        name: impl Into<String>,
        kind: RelationshipKind,
        target: impl Into<String>,
    ) -> Self {
        Relationship {
            name: name.into(),
            kind,
            target: target.into(),
            local_field: None,
            remote_field: None,
            via: None,
            cascade: None,
            inverse: None,
            eager_load: false,
        }
    }

    pub fn fields(mut self, local: &str, remote: &str) -> Self {
        self.local_field = Some(local.to_string());
        self.remote_field = Some(remote.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_field_type_tokens() {
        for name in FieldType::NAMES {
            let ty = FieldType::parse(name).unwrap();
            assert_eq!(ty.as_str(), *name);
        }
        assert_eq!(FieldType::parse("JSONB"), Some(FieldType::Json));
        assert_eq!(FieldType::parse("int[]"), None);
    }

    #[test]
    fn test_relationship_kind_tokens() {
        assert_eq!(
            RelationshipKind::parse("many_to_many"),
            Some(RelationshipKind::ManyToMany)
        );
        assert_eq!(RelationshipKind::parse("has-many"), None);
    }

    #[test]
    fn test_delete_policy_parse() {
        assert_eq!(DeletePolicy::parse("SET NULL"), Some(DeletePolicy::SetNull));
        assert_eq!(DeletePolicy::parse("set_null"), Some(DeletePolicy::SetNull));
        assert_eq!(DeletePolicy::parse("CASCADE"), Some(DeletePolicy::Cascade));
        assert_eq!(DeletePolicy::parse("explode"), None);
    }

    #[test]
    fn test_dependencies_from_fk_and_relationship() {
        let mut product = Entity::new("Product");
        product.add_field(Field::new("id", FieldType::Uuid).primary());
        product.add_field(
            Field::new("category_id", FieldType::Uuid)
                .required()
                .references("Category", "id"),
        );
        product.add_field(Field::new("supplier_id", FieldType::Uuid));
        product.add_relationship(
            Relationship::new("supplier", RelationshipKind::ManyToOne, "Supplier")
                .fields("supplier_id", "id"),
        );

        let deps = product.dependencies();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].target, "Category");
        assert!(deps[0].required);
        assert_eq!(deps[1].target, "Supplier");
        assert!(!deps[1].required);
    }

    #[test]
    fn test_single_primary_key() {
        let mut entity = Entity::new("User");
        entity.add_field(Field::new("id", FieldType::Uuid).primary());
        assert_eq!(entity.single_primary_key().map(|f| f.name.as_str()), Some("id"));

        entity.composite_primary_key = Some(vec!["id".to_string()]);
        assert!(entity.single_primary_key().is_none());
        assert_eq!(entity.primary_key(), vec!["id"]);
    }

    #[test]
    fn test_graph_lookup_and_order() {
        let mut graph = EntityGraph::new(AppInfo::default());
        graph.add_entity(Entity::new("B"));
        graph.add_entity(Entity::new("A"));

        let names: Vec<&str> = graph.entity_names().collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(graph.position("A"), Some(1));
        assert!(graph.contains("B"));
        assert!(graph.dependencies("missing").is_empty());
        assert!(graph.get_entity("A").unwrap().fields.is_empty());
    }
}
