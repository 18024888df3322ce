use maungdb::auth::{Identity, Role, StaticSession};
use maungdb::{EngineConfig, Executor, MaintenanceMode};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use tokio::runtime::Handle;

fn open(dir: &TempDir, mode: MaintenanceMode) -> Executor {
    let session = Arc::new(StaticSession::logged_in(
        Identity::new("asep", Role::Admin).with_database("kantor"),
    ));
    let config = EngineConfig::new()
        .data_dir(dir.path())
        .sync_writes(false)
        .maintenance(mode);
    let executor = Executor::open(config, session).unwrap();
    executor.create_database("kantor").unwrap();
    executor
}

#[tokio::test(flavor = "multi_thread")]
async fn test_background_maintenance_settles() {
    let dir = TempDir::new().unwrap();
    let executor = open(&dir, MaintenanceMode::Background(Handle::current()));

    executor.run("DAMEL users id:INT:PK, email:STRING").unwrap();
    executor.run("DAMEL audit id:INT, email:STRING").unwrap();
    executor.run("TANDAIN users DINA email").unwrap();
    executor
        .run("DAMEL JARAMBAH jejak WAKTU SIMPEN PADA users LAKUKAN SIMPEN audit 1|anyar")
        .unwrap();

    executor.run("SIMPEN users 1|x@y.com").unwrap();
    executor.run("SIMPEN users 2|a@b.com").unwrap();
    executor.settle().await;

    let indexes = executor.indexes();
    assert_eq!(
        indexes.lookup("kantor", "users", "email", "x@y.com").unwrap(),
        vec!["1"]
    );
    assert_eq!(executor.run("TINGALI audit").unwrap().rows.len(), 2);

    executor.run("MICEUN TI users DIMANA id = 1").unwrap();
    executor.settle().await;
    assert!(indexes
        .lookup("kantor", "users", "email", "x@y.com")
        .unwrap()
        .is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_background_trigger_chain_is_bounded() {
    let dir = TempDir::new().unwrap();
    let session = Arc::new(StaticSession::logged_in(
        Identity::new("asep", Role::Admin).with_database("kantor"),
    ));
    let config = EngineConfig::new()
        .data_dir(dir.path())
        .sync_writes(false)
        .max_nesting_depth(2)
        .maintenance(MaintenanceMode::Background(Handle::current()));
    let executor = Executor::open(config, session).unwrap();
    executor.create_database("kantor").unwrap();

    executor.run("DAMEL log id:INT, msg:STRING").unwrap();
    executor
        .run("DAMEL JARAMBAH gema WAKTU SIMPEN PADA log LAKUKAN SIMPEN log 9|gema")
        .unwrap();
    executor.run("SIMPEN log 1|awal").unwrap();
    executor.settle().await;

    assert_eq!(executor.run("TINGALI log").unwrap().rows.len(), 3);
}

#[test]
fn test_concurrent_writers() {
    let dir = TempDir::new().unwrap();
    let executor = open(&dir, MaintenanceMode::Inline);
    executor.run("DAMEL t id:INT:PK, nama:STRING").unwrap();
    executor.run("TANDAIN t DINA nama").unwrap();

    thread::scope(|s| {
        for worker in 0..4 {
            let executor = executor.clone();
            s.spawn(move || {
                for i in 0..10 {
                    let id = worker * 100 + i;
                    executor
                        .run(&format!("SIMPEN t {}|worker{}", id, worker))
                        .unwrap();
                }
            });
        }
    });

    let result = executor.run("TINGALI t").unwrap();
    assert_eq!(result.rows.len(), 40);
    for worker in 0..4 {
        let result = executor
            .run(&format!("TINGALI t DIMANA nama = worker{}", worker))
            .unwrap();
        assert_eq!(result.rows.len(), 10);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_background_patches_follow_statement_order() {
    let dir = TempDir::new().unwrap();
    let executor = open(&dir, MaintenanceMode::Background(Handle::current()));
    executor.run("DAMEL users id:INT:PK, email:STRING").unwrap();
    executor.run("TANDAIN users DINA email").unwrap();

    for round in 0..20 {
        executor.run("SIMPEN users 5|x@y.com").unwrap();
        executor.run("MICEUN TI users DIMANA id = 5").unwrap();
        executor.run("SIMPEN users 5|x@y.com").unwrap();
        executor.settle().await;

        assert_eq!(
            executor
                .indexes()
                .lookup("kantor", "users", "email", "x@y.com")
                .unwrap(),
            vec!["5"],
            "round {}",
            round
        );
        executor.run("MICEUN TI users DIMANA id = 5").unwrap();
    }
}

#[test]
fn test_index_build_during_inserts() {
    let dir = TempDir::new().unwrap();
    let executor = open(&dir, MaintenanceMode::Inline);
    executor.run("DAMEL t id:INT:PK, nama:STRING").unwrap();

    thread::scope(|s| {
        let writer = executor.clone();
        s.spawn(move || {
            for id in 0..100 {
                writer.run(&format!("SIMPEN t {}|n{}", id, id)).unwrap();
            }
        });
        for _ in 0..5 {
            executor.run("TANDAIN t DINA nama").unwrap();
        }
    });

    let indexes = executor.indexes();
    for id in 0..100 {
        assert_eq!(
            indexes
                .lookup("kantor", "t", "nama", &format!("n{}", id))
                .unwrap(),
            vec![id.to_string()]
        );
    }
}
