use lifetree_core::db::open_db_in_memory;
use lifetree_core::{
    Gateway, GatewayErrorKind, ParentRef, SqliteTreeStore, TreeStore, PERSONAL_TREE_ID,
};

const OWNER: &str = "owner-a";

fn life_id<S: TreeStore>(gateway: &Gateway<S>) -> String {
    let tree = gateway.get_tree(PERSONAL_TREE_ID).body.unwrap();
    tree.find_by_name("Life").unwrap().node.id().to_string()
}

#[test]
fn patch_applies_add_update_move_and_delete() {
    let conn = open_db_in_memory().unwrap();
    let gateway = Gateway::new(SqliteTreeStore::try_new(&conn).unwrap(), OWNER);
    let life = life_id(&gateway);

    let add = format!(r#"{{"operation":"ADD","parentID":"{life}","id":"games","title":"Games"}}"#);
    let response = gateway.patch(PERSONAL_TREE_ID, add.as_bytes());
    assert!(response.ok, "{}", response.message);
    assert_eq!(response.message, "ADD applied.");

    let response = gateway.patch(
        PERSONAL_TREE_ID,
        br#"{"operation":"UPDATE","id":"games","title":"Board Games"}"#,
    );
    assert!(response.ok);

    let response = gateway.patch(
        PERSONAL_TREE_ID,
        br#"{"operation":"MOVE","id":"games","parentID":""}"#,
    );
    assert!(response.ok);
    let tree = gateway.get_tree(PERSONAL_TREE_ID).body.unwrap();
    let games = tree.find_by_id("games").unwrap();
    assert_eq!(games.parent, &ParentRef::Root);
    assert_eq!(games.node.title(), "Board Games");
    assert_eq!(games.node.level(), 1);

    let response = gateway.patch(PERSONAL_TREE_ID, br#"{"operation":"DELETE","id":"games"}"#);
    assert!(response.ok);
    let listed = gateway.list(PERSONAL_TREE_ID).body.unwrap();
    assert_eq!(listed.len(), 2);
}

#[test]
fn failures_are_classified_in_the_envelope() {
    let conn = open_db_in_memory().unwrap();
    let gateway = Gateway::new(SqliteTreeStore::try_new(&conn).unwrap(), OWNER);

    let response = gateway.patch(PERSONAL_TREE_ID, br#"{"operation":"FLY","id":"x"}"#);
    assert!(!response.ok);
    assert_eq!(response.kind, Some(GatewayErrorKind::InvalidRequest));

    let response = gateway.patch(
        PERSONAL_TREE_ID,
        br#"{"operation":"MOVE","id":"ghost","parentID":""}"#,
    );
    assert_eq!(response.kind, Some(GatewayErrorKind::NotFound));

    let life = life_id(&gateway);
    let response = gateway.indent(PERSONAL_TREE_ID, &life, &life);
    assert_eq!(response.kind, Some(GatewayErrorKind::InvalidRequest));

    let response = gateway.get_tree("unknown-tree");
    assert_eq!(response.kind, Some(GatewayErrorKind::NotFound));
    assert!(response.body.is_none());
}

#[test]
fn outdent_indent_and_reset_round_trip() {
    let conn = open_db_in_memory().unwrap();
    let gateway = Gateway::new(SqliteTreeStore::try_new(&conn).unwrap(), OWNER);
    let life = life_id(&gateway);
    let add = format!(r#"{{"operation":"ADD","parentID":"{life}","id":"games","title":"Games"}}"#);
    assert!(gateway.patch(PERSONAL_TREE_ID, add.as_bytes()).ok);

    assert!(gateway.outdent(PERSONAL_TREE_ID, "games").ok);
    assert_eq!(
        gateway
            .get_tree(PERSONAL_TREE_ID)
            .body
            .unwrap()
            .get("games")
            .unwrap()
            .level(),
        1
    );
    assert!(gateway.indent(PERSONAL_TREE_ID, "games", &life).ok);

    assert!(gateway.reset(PERSONAL_TREE_ID).ok);
    let tree = gateway.get_tree(PERSONAL_TREE_ID).body.unwrap();
    assert!(!tree.contains("games"));
    assert_eq!(tree.len(), 2);
}

#[test]
fn envelope_serializes_without_empty_fields() {
    let conn = open_db_in_memory().unwrap();
    let gateway = Gateway::new(SqliteTreeStore::try_new(&conn).unwrap(), OWNER);

    let ok = serde_json::to_value(gateway.patch(
        PERSONAL_TREE_ID,
        br#"{"operation":"ADD","id":"x","title":"X"}"#,
    ))
    .unwrap();
    assert_eq!(ok["ok"], true);
    assert!(ok.get("kind").is_none());
    assert!(ok.get("body").is_none());

    let failed = serde_json::to_value(gateway.patch(PERSONAL_TREE_ID, b"{}")).unwrap();
    assert_eq!(failed["ok"], false);
    assert_eq!(failed["kind"], "invalid_request");
}

#[test]
fn gateways_for_different_owners_are_isolated() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteTreeStore::try_new(&conn).unwrap();
    let alice = Gateway::new(&store, "alice");
    let bob = Gateway::new(&store, "bob");

    assert!(alice
        .patch(
            PERSONAL_TREE_ID,
            br#"{"operation":"ADD","id":"x","title":"X"}"#
        )
        .ok);
    assert_eq!(alice.list(PERSONAL_TREE_ID).body.unwrap().len(), 3);
    assert_eq!(bob.list(PERSONAL_TREE_ID).body.unwrap().len(), 2);
}
