use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use apiforge::{
    Annotations, ConfigError, ConversionError, EntitySummary, ForgeError, GenerationError,
    Pipeline, StaticSuggestions, SuggestionError, SuggestionService,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

fn write_document(dir: &TempDir, name: &str, document: &Value) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "{}", serde_json::to_string_pretty(document).unwrap()).unwrap();
    path
}

fn catalog() -> Value {
    json!({
        "app": { "name": "Catalog", "version": "0.3.0" },
        "entities": [
            {
                "name": "Product",
                "fields": [
                    { "name": "id", "type": "uuid", "primary": true },
                    { "name": "sku", "type": "string", "unique": true, "nullable": false },
                    {
                        "name": "category_id", "type": "uuid", "nullable": false,
                        "foreign_key": { "references": "Category.id", "on_delete": "RESTRICT" }
                    }
                ],
                "relationships": [
                    { "name": "category", "type": "many-to-one", "target": "Category", "local_field": "category_id" },
                    { "name": "tags", "type": "many-to-many", "target": "Tag" }
                ]
            },
            {
                "name": "Category",
                "fields": [
                    { "name": "id", "type": "uuid", "primary": true },
                    { "name": "title", "type": "string" }
                ]
            },
            {
                "name": "Tag",
                "fields": [
                    { "name": "id", "type": "uuid", "primary": true },
                    { "name": "label", "type": "string" }
                ]
            }
        ]
    })
}

// ─── END TO END ───

#[tokio::test]
async fn test_category_before_product() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, "catalog.json", &catalog());

    let config = Pipeline::default().run(&path).await.unwrap();
    let order = config.entity_order();
    let position = |name: &str| order.iter().position(|n| *n == name).unwrap();

    assert!(position("Category") < position("Product"));
    assert_eq!(config.app.name, "Catalog");
}

#[tokio::test]
async fn test_product_tag_join_synthesis() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, "catalog.json", &catalog());

    let config = Pipeline::default().run(&path).await.unwrap();
    let plan = config.get("ProductTag").expect("join entity is planned");

    assert_eq!(plan.entity.table_name, "product_tags");
    assert_eq!(
        plan.entity.composite_primary_key,
        Some(vec!["product_id".to_string(), "tag_id".to_string()])
    );
    assert!(plan.entity.get_field("id").is_none());
    for column in ["product_id", "tag_id"] {
        let field = plan.entity.get_field(column).unwrap();
        assert!(!field.nullable);
        assert!(field.foreign_key.is_some());
    }
    assert_eq!(config.join_tables().count(), 1);
}

#[tokio::test]
async fn test_validation_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, "catalog.json", &catalog());
    let pipeline = Pipeline::default();

    let first = pipeline.run(&path).await.unwrap();
    let second = pipeline.run(&path).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

// ─── FAILURES ───

#[tokio::test]
async fn test_misspelled_relationship_target() {
    let mut document = catalog();
    document["entities"][0]["relationships"][0]["target"] = json!("Categroy");

    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, "catalog.json", &document);

    let err = Pipeline::default().validate(&path).await.unwrap_err();
    match &err {
        ForgeError::Conversion(ConversionError::UnknownRelationshipTarget {
            entity,
            target,
            suggestion,
            ..
        }) => {
            assert_eq!(entity, "Product");
            assert_eq!(target, "Categroy");
            assert_eq!(suggestion.as_deref(), Some("Category"));
        }
        other => panic!("expected a conversion error, got {other}"),
    }
}

#[tokio::test]
async fn test_mutual_required_dependency() {
    let document = json!({
        "app": { "name": "Loop" },
        "entities": [
            { "name": "A", "fields": [
                { "name": "id", "type": "uuid", "primary": true },
                { "name": "b_id", "type": "uuid", "nullable": false, "foreign_key": { "references": "B.id" } } ] },
            { "name": "B", "fields": [
                { "name": "id", "type": "uuid", "primary": true },
                { "name": "a_id", "type": "uuid", "nullable": false, "foreign_key": { "references": "A.id" } } ] }
        ]
    });
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, "loop.json", &document);

    // Valid as a graph, impossible to order
    assert!(Pipeline::default().validate(&path).await.is_ok());

    let err = Pipeline::default().run(&path).await.unwrap_err();
    match err {
        ForgeError::Generation(GenerationError::DependencyCycle(cycle)) => {
            assert!(cycle.entities.contains(&"A".to_string()));
            assert!(cycle.entities.contains(&"B".to_string()));
        }
        other => panic!("expected a dependency cycle, got {other}"),
    }
}

#[tokio::test]
async fn test_malformed_json_reports_location() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{\n  \"app\": { \"name\": \"Shop\" },\n  \"entities\": [,]\n}").unwrap();

    let report = Pipeline::default().check(&path).await;
    assert!(!report.is_valid());
    assert_eq!(report.stage(), Some("load"));
    match report.error.as_ref().unwrap() {
        ForgeError::ParseError(detail) => {
            assert_eq!(detail.line, 3);
            assert_eq!(detail.path.as_deref(), Some(path.as_path()));
        }
        other => panic!("expected a parse error, got {other}"),
    }
}

#[tokio::test]
async fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = Pipeline::default()
        .validate(&dir.path().join("absent.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::Io { .. }));
}

// ─── ENRICHMENT ───

#[tokio::test]
async fn test_suggestions_never_override_explicit_unique() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, "catalog.json", &catalog());
    let suggestions = StaticSuggestions::from_json_str(
        r#"{
            "Product": { "fields": { "sku": { "unique": false, "description": "Stock keeping unit" } } },
            "Category": { "unique_fields": ["title"], "business_rules": ["Titles are unique"] }
        }"#,
    )
    .unwrap();

    let config = Pipeline::default()
        .with_suggestions(Arc::new(suggestions))
        .run(&path)
        .await
        .unwrap();

    let sku = config.get("Product").unwrap().entity.get_field("sku").unwrap().clone();
    assert!(sku.unique);
    assert_eq!(sku.description.as_deref(), Some("Stock keeping unit"));

    let category = &config.get("Category").unwrap().entity;
    assert!(category.get_field("title").unwrap().unique);
    assert_eq!(category.business_rules, vec!["Titles are unique"]);
}

/// Never answers; only cancellation or a timeout ends the call.
struct SilentService;

#[async_trait]
impl SuggestionService for SilentService {
    async fn suggest(&self, _entity: &EntitySummary) -> Result<Annotations, SuggestionError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_cancelled_run_keeps_unenriched_graph() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, "catalog.json", &catalog());

    let config = Pipeline::default()
        .with_suggestions(Arc::new(SilentService))
        .run_until(&path, tokio::time::sleep(Duration::from_millis(20)))
        .await
        .unwrap();

    assert!(config.warnings.iter().any(|w| w.contains("cancelled")));
    let category = &config.get("Category").unwrap().entity;
    assert!(!category.get_field("title").unwrap().unique);
    assert_eq!(config.entity_order(), vec!["Category", "Product", "Tag", "ProductTag"]);
}

#[tokio::test]
async fn test_already_cancelled_run_never_merges() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, "catalog.json", &catalog());
    let suggestions =
        StaticSuggestions::from_json_str(r#"{ "Category": { "unique_fields": ["title"] } }"#).unwrap();

    let config = Pipeline::default()
        .with_suggestions(Arc::new(suggestions))
        .run_until(&path, async {})
        .await
        .unwrap();

    assert!(config.warnings.iter().any(|w| w.contains("cancelled")));
    let category = &config.get("Category").unwrap().entity;
    assert!(!category.get_field("title").unwrap().unique);
}

// ─── SCHEMA.ORG ───

#[tokio::test]
async fn test_schema_org_source_runs_end_to_end() {
    let document = json!({
        "@context": { "schema": "https://schema.org/" },
        "@graph": [
            { "@id": "schema:Book", "@type": "rdfs:Class", "rdfs:comment": "A book." },
            { "@id": "schema:Person", "@type": "rdfs:Class" },
            { "@id": "schema:isbn", "@type": "rdf:Property",
              "schema:domainIncludes": { "@id": "schema:Book" },
              "schema:rangeIncludes": { "@id": "schema:Text" } },
            { "@id": "schema:author", "@type": "rdf:Property",
              "schema:domainIncludes": { "@id": "schema:Book" },
              "schema:rangeIncludes": [{ "@id": "schema:Person" }, { "@id": "schema:Organization" }] }
        ]
    });
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, "library.json", &document);

    let summary = Pipeline::default().dry_run(&path).await.unwrap();
    assert_eq!(summary.app, "library");
    assert_eq!(summary.entities, vec!["Book", "Person"]);
    assert!(summary.to_string().contains("Entities (2): Book -> Person"));
}

// ─── CONFIG ───

#[tokio::test]
async fn test_settings_from_toml() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("apiforge.toml");
    std::fs::write(&config_path, "[enrichment]\nenabled = false\n").unwrap();
    let suggestions =
        StaticSuggestions::from_json_str(r#"{ "Category": { "unique_fields": ["title"] } }"#).unwrap();

    let path = write_document(&dir, "catalog.json", &catalog());
    let config = Pipeline::from_config_file(&config_path)
        .unwrap()
        .with_suggestions(Arc::new(suggestions))
        .run(&path)
        .await
        .unwrap();

    assert!(!config.get("Category").unwrap().entity.get_field("title").unwrap().unique);
    assert!(config.warnings.is_empty());
}

#[tokio::test]
async fn test_invalid_settings_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("apiforge.toml");
    std::fs::write(&config_path, "[enrichment]\nmax_concurrency = 0\n").unwrap();

    let err = Pipeline::from_config_file(&config_path).err().unwrap();
    assert!(matches!(err, ForgeError::Config(ConfigError::Invalid { .. })));
}

#[tokio::test]
async fn test_generated_indexes() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, "catalog.json", &catalog());

    let config = Pipeline::default().run(&path).await.unwrap();
    let names: Vec<&str> = config
        .get("Product")
        .unwrap()
        .indexes
        .iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(names, vec!["uq_products_sku", "ix_products_category_id"]);

    let join: Vec<&str> = config
        .get("ProductTag")
        .unwrap()
        .indexes
        .iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(join, vec!["ix_product_tags_tag_id"]);
}
