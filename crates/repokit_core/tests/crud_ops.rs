mod common;

use common::{person_db, repository, repository_with, row_count, Label, Person, TestCache};
use repokit_core::{
    record_of, BaseRepository, BatchQueryOptions, DbRepository, Entity, Field, Filter,
    Operation, OrderField, QueryField, QueryGroup, QueryOptions, QueryRequest, RepoError,
    RepositoryConfig, RepositorySettings, Value,
};
use std::sync::Arc;
use std::time::Duration;

fn seeded() -> (tempfile::TempDir, DbRepository<common::CountingFactory>) {
    let (dir, repo) = repository();
    let people = vec![
        Person::new("Ada", "ada@example.com", 36),
        Person::new("Grace", "grace@example.com", 45),
        Person::new("Linus", "linus@example.com", 28),
        Person::new("Barbara", "barbara@example.com", 51),
    ];
    repo.insert_all_entities(&people, None, None, None).unwrap();
    (dir, repo)
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

#[test]
fn insert_entity_returns_generated_key_and_queries_back() {
    let (_dir, repo) = repository();

    let key = repo
        .insert_entity(&Person::new("Ada", "ada@example.com", 36), None, None)
        .unwrap();
    let people: Vec<Person> = repo
        .query_entities(&Filter::Key(key.clone()), &QueryOptions::default(), None)
        .unwrap();

    assert_eq!(key, Value::Integer(1));
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].id, Some(1));
    assert_eq!(people[0].name, "Ada");
}

#[test]
fn insert_by_table_name_returns_supplied_key() {
    let (_dir, repo) = repository();

    let key = repo
        .insert(
            "Person",
            &record_of([("id", Value::Integer(42)), ("name", text("Ada"))]),
            None,
            None,
        )
        .unwrap();

    assert_eq!(key, Value::Integer(42));
}

#[test]
fn update_entity_and_delete_entity_address_the_primary_key() {
    let (_dir, repo) = seeded();
    let mut grace: Person = repo
        .query_entities(
            &Filter::from(QueryField::equal("name", text("Grace"))),
            &QueryOptions::default(),
            None,
        )
        .unwrap()
        .remove(0);

    grace.age = Some(46);
    assert_eq!(repo.update_entity(&grace, None, None, None).unwrap(), 1);
    let age = repo
        .max(Person::TABLE, &Field::new("age"), &Filter::key(grace.id.unwrap()), None, None)
        .unwrap();
    assert_eq!(age, Value::Integer(46));

    assert_eq!(repo.delete_entity(&grace, None, None).unwrap(), 1);
    assert_eq!(repo.count_all(Person::TABLE, None, None).unwrap(), 3);
}

#[test]
fn update_all_entities_uses_primary_key_by_default() {
    let (_dir, repo) = seeded();
    let mut people: Vec<Person> = repo
        .query_all(Person::TABLE, &QueryOptions::default(), None)
        .unwrap()
        .into_iter()
        .map(|record| Person::from_record(record).unwrap())
        .collect();
    for person in &mut people {
        person.age = person.age.map(|age| age + 1);
    }

    let updated = repo
        .update_all_entities(&people, None, Some(3), None, None)
        .unwrap();
    let total = repo
        .sum_all(Person::TABLE, &Field::new("age"), None, None)
        .unwrap();

    assert_eq!(updated, 4);
    assert_eq!(total, Value::Integer(36 + 45 + 28 + 51 + 4));
}

#[test]
fn merge_entity_inserts_new_rows_and_updates_existing_ones() {
    let (_dir, repo) = repository();
    let mut ada = Person::new("Ada", "ada@example.com", 36);

    let key = repo.merge_entity(&ada, None, None, None).unwrap();
    ada.id = Some(1);
    ada.name = "Ada Lovelace".to_string();
    let same_key = repo.merge_entity(&ada, None, None, None).unwrap();

    assert_eq!(key, Value::Integer(1));
    assert_eq!(same_key, Value::Integer(1));
    let names = repo
        .execute_query("SELECT name FROM Person", &[], None)
        .unwrap();
    assert_eq!(names, vec![record_of([("name", text("Ada Lovelace"))])]);
}

#[test]
fn merge_all_by_qualifier_upserts() {
    let (_dir, repo) = seeded();
    let records = vec![
        record_of([("email", text("ada@example.com")), ("name", text("Countess"))]),
        record_of([("email", text("alan@example.com")), ("name", text("Alan"))]),
    ];
    let qualifiers = [Field::new("email")];

    let affected = repo
        .merge_all("Person", &records, Some(&qualifiers[..]), None, None, None)
        .unwrap();

    assert_eq!(affected, 2);
    assert_eq!(repo.count_all("Person", None, None).unwrap(), 5);
    assert!(repo
        .exists(
            "Person",
            &Filter::from(record_of([("name", text("Countess"))])),
            None,
            None
        )
        .unwrap());
}

#[test]
fn query_applies_projection_order_and_top() {
    let (_dir, repo) = seeded();
    let options = QueryOptions {
        fields: Some(Field::from_names(["name"])),
        order_by: vec![OrderField::descending("age")],
        top: Some(2),
        ..QueryOptions::default()
    };

    let rows = repo
        .query(
            "Person",
            &Filter::from(QueryField::new("age", Operation::GreaterThan, 30)),
            &options,
            None,
        )
        .unwrap();

    assert_eq!(
        rows,
        vec![
            record_of([("name", text("Barbara"))]),
            record_of([("name", text("Grace"))]),
        ]
    );
}

#[test]
fn query_multiple_returns_one_result_per_request() {
    let (_dir, repo) = seeded();
    let requests = vec![
        QueryRequest::new("Person", Filter::key(1)),
        QueryRequest::new("Tag", Filter::All),
        QueryRequest::new(
            "Person",
            Filter::from(QueryField::in_list("name", [text("Ada"), text("Linus")])),
        ),
    ];

    let results = repo.query_multiple(&requests, None).unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].len(), 1);
    assert!(results[1].is_empty());
    assert_eq!(results[2].len(), 2);
}

#[test]
fn batch_query_entities_pages_through_rows() {
    let (_dir, repo) = seeded();
    let order = vec![OrderField::ascending("name")];

    let first: Vec<Person> = repo
        .batch_query_entities(&Filter::All, &BatchQueryOptions::new(0, 3, order.clone()), None)
        .unwrap();
    let second: Vec<Person> = repo
        .batch_query_entities(&Filter::All, &BatchQueryOptions::new(1, 3, order), None)
        .unwrap();

    let names: Vec<_> = first.iter().chain(&second).map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Ada", "Barbara", "Grace", "Linus"]);
}

#[test]
fn aggregates_cover_every_function() {
    let (_dir, repo) = seeded();
    let age = Field::new("age");
    let adults = Filter::from(QueryField::new("age", Operation::GreaterThanOrEqual, 30));

    assert_eq!(repo.count("Person", &adults, None, None).unwrap(), 3);
    assert_eq!(
        repo.min("Person", &age, &adults, None, None).unwrap(),
        Value::Integer(36)
    );
    assert_eq!(
        repo.max_all("Person", &age, None, None).unwrap(),
        Value::Integer(51)
    );
    assert_eq!(
        repo.min_all("Person", &age, None, None).unwrap(),
        Value::Integer(28)
    );
    assert_eq!(
        repo.average_all("Person", &age, None, None).unwrap(),
        Value::Real(40.0)
    );
    assert_eq!(
        repo.average("Person", &age, &adults, None, None).unwrap(),
        Value::Real(44.0)
    );
    assert_eq!(
        repo.sum("Person", &age, &Filter::key(99), None, None).unwrap(),
        Value::Null
    );
}

#[test]
fn truncate_and_delete_all_empty_the_table() {
    let (_dir, repo) = seeded();

    assert_eq!(repo.delete("Person", &Filter::key(1), None, None).unwrap(), 1);
    assert_eq!(repo.delete_all("Person", None, None).unwrap(), 3);
    repo.insert_entity(&Person::new("Ada", "ada@example.com", 36), None, None)
        .unwrap();
    assert_eq!(repo.truncate("Person", None).unwrap(), 1);

    let key = repo
        .insert_entity(&Person::new("Grace", "grace@example.com", 45), None, None)
        .unwrap();
    assert_eq!(key, Value::Integer(1));
}

#[test]
fn execute_families_run_raw_sql() {
    let (_dir, repo) = seeded();

    let changed = repo
        .execute_non_query(
            "UPDATE Person SET age = age + ? WHERE age < ?",
            &[Value::Integer(10), Value::Integer(40)],
            None,
        )
        .unwrap();
    let oldest = repo
        .execute_scalar("SELECT name FROM Person ORDER BY age DESC LIMIT 1", &[], None)
        .unwrap();

    assert_eq!(changed, 2);
    assert_eq!(oldest, text("Barbara"));
}

#[test]
fn key_filters_need_a_primary_key() {
    let (_dir, repo) = repository();

    let err = repo
        .delete("Tag", &Filter::Keys(vec![Value::Integer(1)]), None, None)
        .unwrap_err();

    assert!(matches!(err, RepoError::MissingPrimaryKey(table) if table == "Tag"));
}

#[test]
fn filters_without_conditions_never_touch_rows() {
    let (_dir, repo) = seeded();

    let fields = repo
        .delete("Person", &Filter::Fields(Vec::new()), None, None)
        .unwrap_err();
    let group = repo
        .update(
            "Person",
            &record_of([("age", Value::Integer(0))]),
            &Filter::Group(QueryGroup::default()),
            None,
            None,
        )
        .unwrap_err();

    assert!(matches!(fields, RepoError::InvalidFilter(_)));
    assert!(matches!(group, RepoError::InvalidFilter(_)));
    assert_eq!(row_count(&repo.factory().path(), "Person"), 4);
    assert_eq!(
        repo.min_all("Person", &Field::new("age"), None, None).unwrap(),
        Value::Integer(28)
    );
}

#[test]
fn cached_queries_skip_the_database() {
    let cache = Arc::new(TestCache::default());
    let (_dir, repo) = repository_with(
        RepositorySettings::default()
            .with_cache(cache.clone())
            .with_cache_expiration(Duration::from_secs(60)),
    );
    repo.insert_entity(&Person::new("Ada", "ada@example.com", 36), None, None)
        .unwrap();

    let options = QueryOptions::cached("people");
    let first = repo.query_all("Person", &options, None).unwrap();
    repo.insert_entity(&Person::new("Grace", "grace@example.com", 45), None, None)
        .unwrap();
    let second = repo.query_all("Person", &options, None).unwrap();

    assert_eq!(first, second);
    assert_eq!(cache.hits(), 1);
    assert_eq!(cache.expiration("people"), Some(Duration::from_secs(60)));

    let uncached = repo
        .query_all("Person", &QueryOptions::default(), None)
        .unwrap();
    assert_eq!(uncached.len(), 2);
}

#[test]
fn base_repository_forwards_with_the_entity_table() {
    let (_dir, repo) = repository();
    let people: BaseRepository<Person, _> = BaseRepository::new(repo);

    people
        .insert_all(
            &[
                Person::new("Ada", "ada@example.com", 36),
                Person::new("Grace", "grace@example.com", 45),
            ],
            None,
            None,
            None,
        )
        .unwrap();
    let ada = people
        .query(&Filter::key(1), &QueryOptions::default(), None)
        .unwrap()
        .remove(0);

    assert_eq!(ada.name, "Ada");
    assert_eq!(people.count_all(None, None).unwrap(), 2);
    assert!(people.exists(&Filter::key(2), None, None).unwrap());
    assert_eq!(people.delete_entity(&ada, None, None).unwrap(), 1);
    assert_eq!(
        people.sum_all(&Field::new("age"), None, None).unwrap(),
        Value::Integer(45)
    );
}

#[test]
fn base_repository_keys_filters_by_the_entity_primary_key() {
    let (_dir, repo) = repository();
    let tags: BaseRepository<Label, _> = BaseRepository::new(repo);
    tags.insert_all(
        &[Label::new("rust"), Label::new("sqlite"), Label::new("tokio")],
        None,
        None,
        None,
    )
    .unwrap();
    let pair = Filter::Keys(vec![text("sqlite"), text("tokio")]);

    assert_eq!(tags.count(&pair, None, None).unwrap(), 2);
    assert!(tags.exists(&Filter::key("rust".to_string()), None, None).unwrap());
    assert_eq!(
        tags.min(&Field::new("label"), &pair, None, None).unwrap(),
        text("sqlite")
    );
    assert_eq!(
        tags.delete(&Filter::key("rust".to_string()), None, None)
            .unwrap(),
        1
    );
    assert_eq!(tags.count_all(None, None).unwrap(), 2);
    assert!(matches!(
        tags.db().delete("Tag", &Filter::key("tokio".to_string()), None, None),
        Err(RepoError::MissingPrimaryKey(_))
    ));
}

#[test]
fn from_config_opens_the_configured_file() {
    let (_dir, path) = person_db();
    let config = RepositoryConfig::with_database_path(&path);

    let repo = DbRepository::from_config(&config);
    repo.insert("Tag", &record_of([("label", text("rust"))]), None, None)
        .unwrap();

    assert_eq!(row_count(&path, "Tag"), 1);
    assert_eq!(repo.settings().batch_size, 10);
}
