use std::sync::Arc;

use uuid::Uuid;

use rowforge::drivers::{InMemoryTestDriver, InMemoryTestResponseBuilder};
use rowforge::error::ErrorKind;
use rowforge::mapping::{
    Bean, BeanRowMapper, ConversionResult, Converter, ConverterRegistry, PropertyTable,
    StringToUuid,
};
use rowforge::{sql_enum, Database, SqlEnum, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Rank {
    #[default]
    Recruit,
    Veteran,
    Elite,
}

impl SqlEnum for Rank {
    const VARIANTS: &'static [Self] = &[Rank::Recruit, Rank::Veteran, Rank::Elite];

    fn name(&self) -> &'static str {
        match self {
            Rank::Recruit => "RECRUIT",
            Rank::Veteran => "VETERAN",
            Rank::Elite => "ELITE",
        }
    }
}

sql_enum!(Rank);

#[derive(Debug, Default, PartialEq)]
struct Player {
    id: Option<Uuid>,
    name: String,
    nickname: Option<String>,
    rank: Rank,
    level: u8,
    cached: String,
}

impl Bean for Player {
    fn describe(p: &mut PropertyTable<Self>) {
        p.property("id", |pl: &mut Self, v| pl.id = v)
            .map_with::<StringToUuid>();
        p.property("name", |pl: &mut Self, v| pl.name = v)
            .column("username");
        p.property("nickname", |pl: &mut Self, v| pl.nickname = v);
        p.property("rank", |pl: &mut Self, v| pl.rank = v);
        p.try_property("level", |pl: &mut Self, v: i32| {
            pl.level = u8::try_from(v).map_err(|_| format!("level {} out of range", v))?;
            Ok::<(), String>(())
        });
        p.property("cached", |pl: &mut Self, v| pl.cached = v).skip();
    }
}

fn players(rows: Vec<[Value; 6]>) -> InMemoryTestDriver {
    let builder = rows.into_iter().fold(
        InMemoryTestResponseBuilder::new()
            .columns(&["id", "USERNAME", "nickname", "rank", "level", "cached"]),
        |builder, row| builder.row(row),
    );
    InMemoryTestDriver::new().with_response(builder.build())
}

#[tokio::test]
async fn test_bean_properties_follow_their_declarations() {
    let id = Uuid::new_v4();
    let driver = players(vec![[
        Value::from(id.to_string()),
        Value::from("ann"),
        Value::Null,
        Value::from("ELITE"),
        Value::from(12),
        Value::from("ignored"),
    ]]);
    let db = Database::with_source(Arc::new(driver.clone()));

    let player = db
        .query_for_object("SELECT * FROM players", &BeanRowMapper::<Player>::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        player,
        Player {
            id: Some(id),
            name: "ann".into(),
            nickname: None,
            rank: Rank::Elite,
            level: 12,
            cached: String::new(),
        }
    );
}

#[tokio::test]
async fn test_enum_columns_accept_ordinals() {
    let driver = players(vec![[
        Value::Null,
        Value::from("bob"),
        Value::from("b"),
        Value::from(1),
        Value::from(1),
        Value::Null,
    ]]);
    let db = Database::with_source(Arc::new(driver));

    let player = db
        .query_for_object("SELECT * FROM players", &BeanRowMapper::<Player>::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(player.rank, Rank::Veteran);
    assert_eq!(player.id, None);
    assert_eq!(player.nickname.as_deref(), Some("b"));
}

#[tokio::test]
async fn test_unknown_enum_name_is_a_type_mismatch() {
    let driver = players(vec![[
        Value::Null,
        Value::from("c"),
        Value::Null,
        Value::from("elite"),
        Value::from(1),
        Value::Null,
    ]]);
    let db = Database::with_source(Arc::new(driver));

    let err = db
        .query_for_list("SELECT * FROM players", &BeanRowMapper::<Player>::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[tokio::test]
async fn test_rejecting_setter_is_an_internal_error() {
    let driver = players(vec![[
        Value::Null,
        Value::from("d"),
        Value::Null,
        Value::from("RECRUIT"),
        Value::from(300),
        Value::Null,
    ]]);
    let db = Database::with_source(Arc::new(driver));

    let err = db
        .query_for_list("SELECT * FROM players", &BeanRowMapper::<Player>::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("level 300 out of range"));
}

#[tokio::test]
async fn test_converter_failure_names_the_converter() {
    let driver = players(vec![[
        Value::from("not-a-uuid"),
        Value::from("e"),
        Value::Null,
        Value::from("RECRUIT"),
        Value::from(1),
        Value::Null,
    ]]);
    let db = Database::with_source(Arc::new(driver));

    let err = db
        .query_for_list("SELECT * FROM players", &BeanRowMapper::<Player>::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conversion);
    assert!(err.to_string().contains("StringToUuid"));
}

#[derive(Debug, Default)]
struct Shout {
    suffix: String,
}

impl Converter for Shout {
    fn convert(&self, value: Value) -> ConversionResult {
        match value {
            Value::String(s) => Ok(Value::String(s.to_uppercase() + &self.suffix)),
            other => Ok(other),
        }
    }
}

#[derive(Debug, Default)]
struct Greeting {
    text: String,
}

impl Bean for Greeting {
    fn describe(p: &mut PropertyTable<Self>) {
        p.property("text", |g: &mut Self, v| g.text = v)
            .map_with::<Shout>();
    }
}

#[tokio::test]
async fn test_registered_converter_instance_is_used() {
    let registry = Arc::new(ConverterRegistry::new());
    let mapper = BeanRowMapper::<Greeting>::new()
        .with_registry(Arc::clone(&registry))
        .add_converter(Shout {
            suffix: "!".into(),
        });
    assert!(registry.contains::<Shout>());

    let driver = InMemoryTestDriver::new().with_response(
        InMemoryTestResponseBuilder::new()
            .columns(&["text"])
            .row(["hello"])
            .build(),
    );
    let db = Database::with_source(Arc::new(driver));

    let greeting = db
        .query_for_object("SELECT text FROM greetings", &mapper)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(greeting.text, "HELLO!");
}

#[tokio::test]
async fn test_column_labels_take_precedence_over_names() {
    let driver = InMemoryTestDriver::new().with_response(
        InMemoryTestResponseBuilder::new()
            .labeled_column("display", "text")
            .row(["hi"])
            .build(),
    );
    let db = Database::with_source(Arc::new(driver));

    let greeting = db
        .query_for_object(
            "SELECT display AS text FROM greetings",
            &BeanRowMapper::<Greeting>::new(),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(greeting.text, "HI");
}
