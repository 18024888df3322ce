use maungdb::auth::{Identity, Role, StaticSession};
use maungdb::{EngineConfig, Error, Executor};
use std::sync::Arc;
use tempfile::TempDir;

fn setup() -> (TempDir, Arc<StaticSession>, Executor) {
    setup_with(|config| config)
}

fn setup_with(
    configure: impl FnOnce(EngineConfig) -> EngineConfig,
) -> (TempDir, Arc<StaticSession>, Executor) {
    let dir = TempDir::new().unwrap();
    let session = Arc::new(StaticSession::logged_in(
        Identity::new("asep", Role::SuperMaung).with_database("kantor"),
    ));
    let config = configure(EngineConfig::new().data_dir(dir.path()).sync_writes(false));
    let executor = Executor::open(config, session.clone()).unwrap();
    executor.create_database("kantor").unwrap();
    (dir, session, executor)
}

fn seed_pegawai(executor: &Executor) {
    executor
        .run("DAMEL pegawai id:INT:PK, nama:STRING, gaji:FLOAT")
        .unwrap();
    executor.run("SIMPEN pegawai 1|Asep|9000000").unwrap();
    executor.run("SIMPEN pegawai 2|Euis|4000000").unwrap();
    executor.run("SIMPEN pegawai 3|Ujang|6500000").unwrap();
}

fn ids(rows: &[Vec<String>]) -> Vec<&str> {
    rows.iter().map(|row| row[0].as_str()).collect()
}

// ========== SELECT ==========

#[test]
fn test_english_statements() {
    let (_dir, _session, executor) = setup();
    executor
        .run("CREATE pegawai id:INT:PK,nama:STRING,gaji:FLOAT")
        .unwrap();
    executor.run("INSERT pegawai 1|Asep|9000000").unwrap();

    let result = executor.run("SELECT pegawai WHERE gaji > 5000000").unwrap();
    assert_eq!(result.columns, vec!["id", "nama", "gaji"]);
    assert_eq!(result.rows, vec![vec!["1", "Asep", "9000000"]]);
}

#[test]
fn test_insertion_order_preserved() {
    let (_dir, _session, executor) = setup();
    executor.run("DAMEL t id:INT:PK, nama:STRING").unwrap();
    for (id, name) in [(5, "e"), (1, "a"), (3, "c"), (2, "b")] {
        executor.run(&format!("SIMPEN t {}|{}", id, name)).unwrap();
    }

    let result = executor.run("TINGALI t").unwrap();
    assert_eq!(ids(&result.rows), vec!["5", "1", "3", "2"]);
}

#[test]
fn test_where_chain_is_left_to_right() {
    let (_dir, _session, executor) = setup();
    seed_pegawai(&executor);

    // ((id = 1 OR id = 2) AND gaji < 5000000), not id = 1 OR (...)
    let result = executor
        .run("TINGALI pegawai DIMANA id = 1 ATAWA id = 2 SARENG gaji < 5000000")
        .unwrap();
    assert_eq!(ids(&result.rows), vec!["2"]);

    let result = executor
        .run("TINGALI pegawai DIMANA nama JIGA sep")
        .unwrap();
    assert_eq!(ids(&result.rows), vec!["1"]);

    let result = executor
        .run("TINGALI pegawai DIMANA umur > 5")
        .unwrap();
    assert!(result.rows.is_empty());
}

#[test]
fn test_projection_order_and_pagination() {
    let (_dir, _session, executor) = setup();
    seed_pegawai(&executor);

    let result = executor
        .run("TINGALI nama, gaji TI pegawai RUNTUYKEUN gaji TI_LUHUR")
        .unwrap();
    assert_eq!(result.columns, vec!["nama", "gaji"]);
    assert_eq!(
        result.rows,
        vec![
            vec!["Asep", "9000000"],
            vec!["Ujang", "6500000"],
            vec!["Euis", "4000000"],
        ]
    );

    let result = executor
        .run("TINGALI pegawai RUNTUYKEUN gaji SAKADAR 1 LIWATAN 1")
        .unwrap();
    assert_eq!(ids(&result.rows), vec!["3"]);

    let result = executor.run("TINGALI pegawai LIWATAN 5").unwrap();
    assert!(result.rows.is_empty());

    assert!(matches!(
        executor.run("TINGALI nama TI pegawai RUNTUYKEUN gaji"),
        Err(Error::ColumnNotFound(..))
    ));
}

#[test]
fn test_aggregates_without_grouping() {
    let (_dir, _session, executor) = setup();
    seed_pegawai(&executor);

    let result = executor
        .run("TINGALI COUNT(*), SUM(gaji), AVG(gaji), MIN(gaji), MAX(nama) TI pegawai")
        .unwrap();
    assert_eq!(
        result.columns,
        vec!["COUNT(*)", "SUM(gaji)", "AVG(gaji)", "MIN(gaji)", "MAX(nama)"]
    );
    assert_eq!(
        result.rows,
        vec![vec!["3", "19500000", "6500000", "4000000", "Ujang"]]
    );

    let result = executor
        .run("TINGALI COUNT(*), AVG(gaji) TI pegawai DIMANA gaji > 10000000")
        .unwrap();
    assert_eq!(result.rows, vec![vec!["0", "NULL"]]);
}

#[test]
fn test_group_by_having() {
    let (_dir, _session, executor) = setup();
    executor
        .run("DAMEL sales id:INT:PK, region:STRING, amount:FLOAT")
        .unwrap();
    executor.run("SIMPEN sales 1|Bandung|100").unwrap();
    executor.run("SIMPEN sales 2|Garut|50").unwrap();
    executor.run("SIMPEN sales 3|Bandung|25").unwrap();
    executor.run("SIMPEN sales 4|Cianjur|10").unwrap();
    executor.run("SIMPEN sales 5|Garut|5").unwrap();

    let result = executor
        .run("TINGALI region, COUNT(id), SUM(amount) TI sales KUMPULKEUN DUMASAR region")
        .unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec!["Bandung", "2", "125"],
            vec!["Garut", "2", "55"],
            vec!["Cianjur", "1", "10"],
        ]
    );

    let result = executor
        .run("SELECT sales GROUP BY region HAVING COUNT(id) > 1")
        .unwrap();
    assert_eq!(ids(&result.rows), vec!["1", "2"]);

    let result = executor
        .run("TINGALI region, SUM(amount) TI sales KUMPULKEUN region MUN SYARATNA SUM(amount) >= 100")
        .unwrap();
    assert_eq!(result.rows, vec![vec!["Bandung", "125"]]);
}

#[test]
fn test_joins() {
    let (_dir, _session, executor) = setup();
    executor.run("DAMEL a id:INT:PK, nama:STRING").unwrap();
    executor
        .run("DAMEL b id:INT:PK, aid:INT, note:STRING")
        .unwrap();
    executor.run("SIMPEN a 1|Asep").unwrap();
    executor.run("SIMPEN a 2|Euis").unwrap();
    executor.run("SIMPEN b 10|2|x").unwrap();
    executor.run("SIMPEN b 11|9|y").unwrap();

    let result = executor
        .run("TINGALI a KENCA GABUNG b DINA a.id = b.aid")
        .unwrap();
    assert_eq!(result.columns, vec!["a.id", "a.nama", "b.id", "b.aid", "b.note"]);
    assert_eq!(
        result.rows,
        vec![
            vec!["1", "Asep", "NULL", "NULL", "NULL"],
            vec!["2", "Euis", "10", "2", "x"],
        ]
    );

    let result = executor
        .run("TINGALI a.nama, b.note TI a GABUNG b DINA a.id = b.aid")
        .unwrap();
    assert_eq!(result.rows, vec![vec!["Euis", "x"]]);

    let result = executor
        .run("TINGALI a PINUH GABUNG b DINA a.id = b.aid")
        .unwrap();
    assert_eq!(result.rows.len(), 3);
    assert_eq!(result.rows[2], vec!["NULL", "NULL", "11", "9", "y"]);

    let result = executor
        .run("TINGALI a KATUHU GABUNG b DINA a.id = b.aid DIMANA b.note = y")
        .unwrap();
    assert_eq!(result.rows, vec![vec!["NULL", "NULL", "11", "9", "y"]]);
}

// ========== Writes ==========

#[test]
fn test_update_and_delete_without_where_touch_every_row() {
    let (_dir, _session, executor) = setup();
    seed_pegawai(&executor);

    let result = executor.run("OMEAN pegawai JADI gaji=1").unwrap();
    assert_eq!(result.message.as_deref(), Some("3 row(s) updated in 'pegawai'"));

    let result = executor.run("MICEUN TI pegawai").unwrap();
    assert_eq!(result.message.as_deref(), Some("3 row(s) deleted from 'pegawai'"));
    assert!(executor.run("TINGALI pegawai").unwrap().rows.is_empty());
}

#[test]
fn test_constraints() {
    let (_dir, _session, executor) = setup();
    seed_pegawai(&executor);

    assert!(matches!(
        executor.run("SIMPEN pegawai 1|Dup|1"),
        Err(Error::ConstraintViolation(_))
    ));
    assert!(matches!(
        executor.run("SIMPEN pegawai 4|Cecep"),
        Err(Error::FieldCountMismatch { .. })
    ));
    assert!(matches!(
        executor.run("SIMPEN pegawai 4|Cecep|loba"),
        Err(Error::TypeMismatch { .. })
    ));
    assert_eq!(executor.run("TINGALI pegawai").unwrap().rows.len(), 3);
}

#[test]
fn test_line_breaks_rejected() {
    let (_dir, _session, executor) = setup();
    executor.run("DAMEL t id:INT:PK, nama:STRING").unwrap();
    executor.run("SIMPEN t 1|a").unwrap();

    assert!(matches!(
        executor.run("SIMPEN t 2|b\n3"),
        Err(Error::ConstraintViolation(_))
    ));
    assert!(matches!(
        executor.run("SIMPEN t 2|b\r\n3"),
        Err(Error::ConstraintViolation(_))
    ));
    let result = executor.run("TINGALI t").unwrap();
    assert_eq!(result.rows, vec![vec!["1", "a"]]);
}

#[test]
fn test_update_respects_unique_and_foreign_keys() {
    let (_dir, _session, executor) = setup();
    executor.run("DAMEL t id:INT:PK, kode:STRING:UNIQUE").unwrap();
    executor.run("SIMPEN t 1|a").unwrap();
    executor.run("SIMPEN t 2|b").unwrap();
    executor.run("SIMPEN t 3|c").unwrap();

    // Collides with a row the WHERE leaves alone
    assert!(matches!(
        executor.run("OMEAN t JADI id=1 DIMANA id = 2"),
        Err(Error::ConstraintViolation(_))
    ));
    // Gives two matched rows the same unique value
    assert!(matches!(
        executor.run("OMEAN t JADI kode=z DIMANA id > 1"),
        Err(Error::ConstraintViolation(_))
    ));
    // Rewriting a row with its own value is fine
    executor.run("OMEAN t JADI kode=b DIMANA id = 2").unwrap();
    executor.run("OMEAN t JADI id=9 DIMANA id = 3").unwrap();

    let result = executor.run("TINGALI t").unwrap();
    assert_eq!(
        result.rows,
        vec![vec!["1", "a"], vec!["2", "b"], vec!["9", "c"]]
    );

    executor
        .run("DAMEL anak id:INT:PK, induk:INT:FK(t.id)")
        .unwrap();
    executor.run("SIMPEN anak 1|1").unwrap();
    assert!(matches!(
        executor.run("OMEAN anak JADI induk=3 DIMANA id = 1"),
        Err(Error::ConstraintViolation(_))
    ));
    executor.run("OMEAN anak JADI induk=9 DIMANA id = 1").unwrap();
    assert_eq!(
        executor.run("TINGALI anak").unwrap().rows,
        vec![vec!["1", "9"]]
    );
}

// ========== Indexes ==========

#[test]
fn test_hash_index_preserves_results() {
    let (_dir, _session, executor) = setup();
    seed_pegawai(&executor);
    executor.run("SIMPEN pegawai 4|Asep|1000").unwrap();

    let queries = [
        "TINGALI pegawai DIMANA nama = Asep",
        "TINGALI pegawai DIMANA nama = Nobody",
        "TINGALI nama TI pegawai DIMANA nama = Euis",
    ];
    let before: Vec<_> = queries.iter().map(|q| executor.run(q).unwrap()).collect();

    let result = executor.run("TANDAIN pegawai DINA nama").unwrap();
    assert_eq!(
        result.message.as_deref(),
        Some("Index created on pegawai.nama (3 keys)")
    );
    let after: Vec<_> = queries.iter().map(|q| executor.run(q).unwrap()).collect();
    assert_eq!(before, after);

    executor
        .run("OMEAN pegawai JADI nama=Anyar DIMANA id = 2")
        .unwrap();
    let result = executor.run("TINGALI pegawai DIMANA nama = Anyar").unwrap();
    assert_eq!(ids(&result.rows), vec!["2"]);
    let result = executor.run("TINGALI pegawai DIMANA nama = Euis").unwrap();
    assert!(result.rows.is_empty());
}

#[test]
fn test_hash_index_has_no_stale_keys_after_delete() {
    let (dir, _session, executor) = setup();
    executor.run("DAMEL users id:INT:PK, email:STRING").unwrap();
    executor.run("TANDAIN users DINA email").unwrap();
    executor.run("SIMPEN users 1|x@y.com").unwrap();
    executor.run("SIMPEN users 2|a@b.com").unwrap();

    executor.run("MICEUN TI users DIMANA email = x@y.com").unwrap();

    let indexes = executor.indexes();
    assert!(indexes
        .lookup("kantor", "users", "email", "x@y.com")
        .unwrap()
        .is_empty());
    assert_eq!(
        indexes.lookup("kantor", "users", "email", "a@b.com").unwrap(),
        vec!["2"]
    );

    let content = std::fs::read_to_string(dir.path().join("db_kantor/users.email.idx")).unwrap();
    let data: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content).unwrap();
    assert!(!data.contains_key("x@y.com"));
}

#[test]
fn test_full_text_search() {
    let (_dir, _session, executor) = setup();
    executor.run("DAMEL buku id:INT:PK, judul:TEXT").unwrap();
    executor.run("SIMPEN buku 1|Belajar Rust Dasar").unwrap();
    executor.run("SIMPEN buku 2|Rust Lanjutan").unwrap();
    executor.run("SIMPEN buku 3|Go Dasar").unwrap();

    assert!(matches!(
        executor.run("KOREHAN buku DINA judul MILARI rust"),
        Err(Error::IndexNotFound { .. })
    ));

    executor.run("DAMEL INDEKS_TEKS buku DINA judul").unwrap();
    executor.run("SIMPEN buku 4|Rust Async").unwrap();

    let result = executor.run("KOREHAN buku DINA judul MILARI \"RUST\"").unwrap();
    assert_eq!(result.columns, vec!["id", "judul"]);
    assert_eq!(ids(&result.rows), vec!["1", "2", "4"]);

    // Tokens of two characters or fewer are never indexed
    let result = executor.run("KOREHAN buku DINA judul MILARI go").unwrap();
    assert!(result.rows.is_empty());
}

// ========== Views & triggers ==========

#[test]
fn test_views() {
    let (_dir, _session, executor) = setup();
    seed_pegawai(&executor);

    executor
        .run("DAMEL KACA beunghar TINA TINGALI pegawai DIMANA gaji > 5000000")
        .unwrap();
    executor
        .run("DAMEL KACA ngaran TINA TINGALI nama TI beunghar")
        .unwrap();

    let result = executor.run("TINGALI beunghar").unwrap();
    assert_eq!(ids(&result.rows), vec!["1", "3"]);

    let result = executor.run("TINGALI ngaran DIMANA nama = Ujang").unwrap();
    assert_eq!(result.rows, vec![vec!["Ujang"]]);

    assert!(matches!(
        executor.run("DAMEL KACA pegawai TINA TINGALI beunghar"),
        Err(Error::TableAlreadyExists(_))
    ));
    assert!(matches!(
        executor.run("DAMEL beunghar id:INT"),
        Err(Error::TableAlreadyExists(_))
    ));

    executor.run("DAMEL KACA muter TINA TINGALI muter").unwrap();
    assert!(matches!(
        executor.run("TINGALI muter"),
        Err(Error::NestingTooDeep(_))
    ));
}

#[test]
fn test_trigger_fires_after_insert() {
    let (_dir, _session, executor) = setup();
    seed_pegawai(&executor);
    executor.run("DAMEL log id:INT, msg:STRING").unwrap();
    executor
        .run("DAMEL JARAMBAH catet WAKTU SIMPEN PADA pegawai LAKUKAN SIMPEN log 1|anyar")
        .unwrap();
    executor
        .run("DAMEL JARAMBAH beresih WAKTU MICEUN PADA pegawai LAKUKAN SIMPEN log 2|miceun")
        .unwrap();

    executor.run("SIMPEN pegawai 4|Cecep|1000").unwrap();
    let result = executor.run("TINGALI log").unwrap();
    assert_eq!(result.rows, vec![vec!["1", "anyar"]]);

    executor.run("MICEUN TI pegawai DIMANA id = 4").unwrap();
    let result = executor.run("TINGALI log").unwrap();
    assert_eq!(result.rows.len(), 2);
}

#[test]
fn test_trigger_recursion_is_bounded() {
    let (_dir, _session, executor) = setup_with(|config| config.max_nesting_depth(3));
    executor.run("DAMEL log id:INT, msg:STRING").unwrap();
    executor
        .run("DAMEL JARAMBAH gema WAKTU SIMPEN PADA log LAKUKAN SIMPEN log 9|gema")
        .unwrap();

    executor.run("SIMPEN log 1|awal").unwrap();
    let result = executor.run("TINGALI log").unwrap();
    assert_eq!(result.rows.len(), 4);
}

// ========== Auth & cluster ==========

#[test]
fn test_authorization() {
    let (_dir, session, executor) = setup();
    seed_pegawai(&executor);

    session
        .login(Identity::new("ujang", Role::User).with_database("kantor"))
        .unwrap();
    assert_eq!(executor.run("TINGALI pegawai").unwrap().rows.len(), 3);
    assert!(matches!(
        executor.run("DAMEL t id:INT"),
        Err(Error::InsufficientRole { .. })
    ));
    assert!(matches!(
        executor.run("SIMPEN pegawai 9|Ujang|1"),
        Err(Error::PermissionDenied { .. })
    ));
    assert!(matches!(
        executor.run("JADI INDUNG"),
        Err(Error::InsufficientRole { .. })
    ));

    session.login(Identity::new("ujang", Role::User)).unwrap();
    assert!(matches!(
        executor.run("TINGALI pegawai"),
        Err(Error::NoDatabaseSelected)
    ));
    let result = executor.run("TINGALI PANGKAL").unwrap();
    assert_eq!(result.columns, vec!["database"]);
    assert_eq!(result.rows, vec![vec!["kantor"]]);

    session.logout().unwrap();
    assert!(matches!(
        executor.run("TINGALI pegawai"),
        Err(Error::NotLoggedIn)
    ));
}

#[test]
fn test_replica_is_read_only() {
    let (_dir, _session, executor) = setup();
    seed_pegawai(&executor);

    executor.run("JADI ANAK NGINTIL 10.0.0.1").unwrap();
    assert!(matches!(
        executor.run("SIMPEN pegawai 4|Cecep|1"),
        Err(Error::ReadOnlyReplica)
    ));
    assert!(matches!(
        executor.run("DAMEL t id:INT"),
        Err(Error::ReadOnlyReplica)
    ));
    assert_eq!(executor.run("TINGALI pegawai").unwrap().rows.len(), 3);

    executor.run("JADI INDUNG").unwrap();
    executor.run("SIMPEN pegawai 4|Cecep|1").unwrap();
    assert_eq!(executor.run("TINGALI pegawai").unwrap().rows.len(), 4);
}
