//! End-to-end record persistence through a pooled on-disk database.

use once_cell::sync::Lazy;
use rowmap::model::defaults;
use rowmap::{Entity, Executor, FieldDescriptor, Pool, PoolConfig, Record, RecordSchema, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct User;

static USER: Lazy<Arc<RecordSchema>> = Lazy::new(|| {
    RecordSchema::builder("User")
        .table("users")
        .field("id", FieldDescriptor::integer().primary_key())
        .field("name", FieldDescriptor::string())
        .build()
        .expect("valid User declaration")
});

impl Entity for User {
    fn schema() -> Arc<RecordSchema> {
        USER.clone()
    }
}

struct Blog;

static BLOG: Lazy<Arc<RecordSchema>> = Lazy::new(|| {
    RecordSchema::builder("Blog")
        .table("blogs")
        .field("id", FieldDescriptor::string().ddl("varchar(50)").primary_key().default_with(defaults::unique_id))
        .field("title", FieldDescriptor::string().name("name"))
        .field("published", FieldDescriptor::boolean())
        .field("created_at", FieldDescriptor::float().default_with(defaults::unix_timestamp))
        .build()
        .expect("valid Blog declaration")
});

impl Entity for Blog {
    fn schema() -> Arc<RecordSchema> {
        BLOG.clone()
    }
}

async fn setup(maxsize: usize) -> (TempDir, Executor) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifecycle.db");
    let config = PoolConfig::new(path.to_string_lossy())
        .maxsize(maxsize)
        .acquire_timeout(Duration::from_secs(5));
    let executor = Executor::new(Pool::initialize(config).await.unwrap());
    executor
        .execute("create table `users` (`id` bigint primary key, `name` varchar(100))", &[])
        .await
        .unwrap();
    executor
        .execute(
            "create table `blogs` (`id` varchar(50) primary key, `name` varchar(100), `published` boolean, `created_at` real)",
            &[],
        )
        .await
        .unwrap();
    (dir, executor)
}

#[tokio::test]
async fn saved_user_is_found_by_default_key() {
    let (_dir, executor) = setup(2).await;

    let mut user = User::record().with("name", "c").unwrap();
    user.save(&executor).await.unwrap();

    let found = Record::find(&executor, &User::schema(), 0).await.unwrap().expect("saved user");
    assert_eq!(found.get("name"), Some(&Value::from("c")));
    assert_eq!(found.get("id"), Some(&Value::Integer(0)));
}

#[tokio::test]
async fn supplier_defaults_round_trip() {
    let (_dir, executor) = setup(2).await;

    let mut blog = Blog::record().with("title", "Hello").unwrap();
    blog.save(&executor).await.unwrap();

    let id = blog.primary_key_value().cloned().expect("generated id");
    let created_at = blog.get("created_at").cloned().expect("generated timestamp");

    let found = Record::find(&executor, &Blog::schema(), id.clone()).await.unwrap().expect("saved blog");
    assert_eq!(found.get("id"), Some(&id));
    assert_eq!(found.get("title"), Some(&Value::from("Hello")));
    assert_eq!(found.get("created_at"), Some(&created_at));
    assert_eq!(found.get_as::<bool>("published").unwrap(), Some(false));
}

#[tokio::test]
async fn find_all_counts_saved_records() {
    let (_dir, executor) = setup(3).await;
    let schema = Blog::schema();

    assert!(Record::find_all(&executor, &schema).await.unwrap().is_empty());
    for i in 0..5 {
        let mut blog = Blog::record().with("title", format!("post {}", i)).unwrap();
        blog.save(&executor).await.unwrap();
    }

    assert_eq!(Record::find_all(&executor, &schema).await.unwrap().len(), 5);
    assert_eq!(Record::count(&executor, &schema).await.unwrap(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_saves_serialize_on_single_connection() {
    let (_dir, executor) = setup(1).await;

    let first = {
        let executor = executor.clone();
        tokio::spawn(async move {
            let mut user = User::record().with("id", 1).unwrap().with("name", "a").unwrap();
            user.save(&executor).await
        })
    };
    let second = {
        let executor = executor.clone();
        tokio::spawn(async move {
            let mut user = User::record().with("id", 2).unwrap().with("name", "b").unwrap();
            user.save(&executor).await
        })
    };

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(Record::count(&executor, &User::schema()).await.unwrap(), 2);
    let status = executor.pool().status();
    assert_eq!(status.in_use, 0);
    assert_eq!(status.size, 1);
}

#[tokio::test]
async fn save_waits_for_the_held_connection() {
    let (_dir, executor) = setup(1).await;

    let held = executor.pool().acquire().await.unwrap();
    let pending = {
        let executor = executor.clone();
        tokio::spawn(async move {
            let mut user = User::record().with("id", 4).unwrap().with("name", "late").unwrap();
            user.save(&executor).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!pending.is_finished());
    assert_eq!(executor.pool().status().in_use, 1);

    drop(held);
    pending.await.unwrap().unwrap();

    let found = Record::find(&executor, &User::schema(), 4).await.unwrap().unwrap();
    assert_eq!(found.value("name"), Value::from("late"));
}

#[tokio::test]
async fn update_without_defaults_clears_unset_fields() {
    let (_dir, executor) = setup(1).await;

    let mut user = User::record().with("id", 3).unwrap().with("name", "kept").unwrap();
    user.save(&executor).await.unwrap();

    let blank = User::record().with("id", 3).unwrap();
    assert_eq!(blank.update(&executor).await.unwrap(), 1);

    let found = Record::find(&executor, &User::schema(), 3).await.unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&Value::Null));
}
