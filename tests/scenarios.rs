use std::sync::Arc;

use livefig::{
    DeleteOutcome, Livefig, MemoryStore, Options, OptionsHost, SaveOutcome, Snapshot,
    diff::diff, flatten::flatten, unflatten::unflatten,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
struct Db {
    host: String,
    port: i32,
}

impl Options for Db {}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
struct CircleShape {
    #[serde(rename = "Type")]
    kind: String,
    radius: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
struct SquareShape {
    #[serde(rename = "Type")]
    kind: String,
    side: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
struct BaseShape {
    #[serde(rename = "Type")]
    kind: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
enum Shape {
    CircleShape(CircleShape),
    SquareShape(SquareShape),
    Shape(BaseShape),
}

impl Default for Shape {
    fn default() -> Self {
        Shape::Shape(BaseShape::default())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
struct Canvas {
    shape: Shape,
}

impl Options for Canvas {}

fn host_over(pairs: &[(&str, Option<&str>)]) -> OptionsHost {
    Livefig::builder()
        .no_env()
        .store(MemoryStore::from_pairs(pairs.iter().copied()))
        .build()
        .unwrap()
}

#[test]
fn binds_db_section() {
    let snapshot = Snapshot::from_pairs([("db:host", Some("localhost")), ("db:port", Some("5432"))]);
    let db: Db = unflatten(&snapshot, "db").unwrap();
    assert_eq!(
        db,
        Db {
            host: "localhost".into(),
            port: 5432
        }
    );
}

#[test]
fn port_change_is_a_single_update() {
    let host = host_over(&[("db:host", Some("localhost")), ("db:port", Some("5432"))]);
    let provider = &host.root().providers()[0];
    let stored = provider.section("db");

    let mut db: Db = unflatten(&stored, "db").unwrap();
    db.port = 5433;
    let changes = diff(&stored, &flatten(&db, "db").unwrap());

    assert_eq!(changes.to_update.len(), 1);
    assert_eq!(changes.to_update[0].path, "db:port");
    assert_eq!(changes.to_update[0].value.as_deref(), Some("5433"));
    assert!(changes.to_insert.is_empty());
    assert!(changes.to_delete.is_empty());
}

#[test]
fn save_then_read_back() {
    let host = host_over(&[("db:host", Some("localhost")), ("db:port", Some("5432"))]);
    let before = host.get::<Db>("db").unwrap().unwrap();

    let outcome = host.try_save("db", |db: &mut Db| db.port = 5433).unwrap();
    assert_eq!(outcome, SaveOutcome::Ok);

    let after = host.get::<Db>("db").unwrap().unwrap();
    assert_eq!(after.port, 5433);
    assert_eq!(before.port, 5432);
    assert!(!Arc::ptr_eq(&before, &after));
}

#[test]
fn delete_section_leaves_it_absent() {
    let host = host_over(&[
        ("db:host", Some("localhost")),
        ("db:port", Some("5432")),
        ("dbx:keep", Some("1")),
    ]);
    assert_eq!(host.try_delete("db").unwrap(), DeleteOutcome::NoContent);
    assert!(host.get::<Db>("db").unwrap().is_none());
    assert!(!host.root().has_prefix("db"));
    assert!(host.root().has_prefix("dbx"));
    assert_eq!(host.try_delete("db").unwrap(), DeleteOutcome::NotFound);
}

#[test]
fn discriminator_selects_subtype() {
    let host = host_over(&[
        ("canvas:shape:Type", Some("Circle")),
        ("canvas:shape:radius", Some("2.5")),
    ]);
    let canvas = host.get::<Canvas>("canvas").unwrap().unwrap();
    match &canvas.shape {
        Shape::CircleShape(circle) => {
            assert_eq!(circle.kind, "Circle");
            assert_eq!(circle.radius, 2.5);
        }
        other => panic!("Expected CircleShape, got: {other:?}"),
    }
}

#[test]
fn discriminator_alone_selects_subtype() {
    let host = host_over(&[("canvas:shape:Type", Some("Circle"))]);
    let canvas = host.get::<Canvas>("canvas").unwrap().unwrap();
    assert_eq!(
        canvas.shape,
        Shape::CircleShape(CircleShape {
            kind: "Circle".into(),
            radius: 0.0
        })
    );
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
struct Route {
    path: String,
    #[serde(default)]
    timeout: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct Routes {
    routes: Vec<Route>,
    fallback: Vec<String>,
}

impl Default for Routes {
    fn default() -> Self {
        Routes {
            routes: Vec::new(),
            fallback: vec!["/".into()],
        }
    }
}

impl Options for Routes {}

#[test]
fn list_element_missing_a_field_binds() {
    let host = host_over(&[
        ("web:routes:0:path", Some("/a")),
        ("web:routes:0:timeout", Some("5")),
        ("web:routes:1:path", Some("/b")),
    ]);
    let web = host.get::<Routes>("web").unwrap().unwrap();
    assert_eq!(web.routes.len(), 2);
    assert_eq!(web.routes[0].timeout, 5);
    assert_eq!(
        web.routes[1],
        Route {
            path: "/b".into(),
            timeout: 0
        }
    );
    assert_eq!(web.fallback, vec!["/".to_string()]);
}

#[test]
fn empty_list_round_trips_over_non_empty_default() {
    let original = Routes {
        routes: vec![],
        fallback: vec![],
    };
    let back: Routes = unflatten(&flatten(&original, "web").unwrap(), "web").unwrap();
    assert_eq!(back, original);
}
