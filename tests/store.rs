use syslogkit::{Error, Facility, LogFilter, LogStore, Severity, SyslogMessage};

fn message(text: &str) -> SyslogMessage {
    SyslogMessage::new(Facility::LOCAL0, Severity::WARNING, text)
        .with_timestamp("Jun 30 12:00:00")
        .with_hostname("db1")
        .with_app_name("postgres")
}

#[test]
fn write_then_query_returns_it_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::new();
    store.open(dir.path().join("logs.db")).unwrap();

    store.write(&message("older")).unwrap();
    let latest = message("checkpoint complete");
    store.write(&latest).unwrap();

    let got = store
        .query(&LogFilter {
            limit: 10,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(got.len(), 2);
    assert_eq!(got[0], latest);
}

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs.db");

    {
        let store = LogStore::new();
        store.open(&path).unwrap();
        store.write(&message("persisted")).unwrap();
    }

    let store = LogStore::new();
    store.open(&path).unwrap();
    assert!(store.is_open());
    assert_eq!(store.db_path(), Some(path));

    let got = store.query(&LogFilter::default()).unwrap();
    assert_eq!(got, vec![message("persisted")]);
}

#[test]
fn open_switches_database() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.db");
    let second = dir.path().join("second.db");

    let store = LogStore::new();
    store.open(&first).unwrap();
    store.write(&message("into first")).unwrap();

    store.open(&second).unwrap();
    assert_eq!(store.db_path(), Some(second.clone()));
    assert!(store.query(&LogFilter::default()).unwrap().is_empty());
    store.write(&message("into second")).unwrap();

    store.open(&first).unwrap();
    let got = store.query(&LogFilter::default()).unwrap();
    assert_eq!(got, vec![message("into first")]);
}

#[test]
fn query_filters() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::new();
    store.open(dir.path().join("logs.db")).unwrap();

    for i in 0..60 {
        store.write(&message(&format!("row {i}"))).unwrap();
    }

    assert_eq!(store.query(&LogFilter::default()).unwrap().len(), 50);

    let none = LogFilter {
        limit: 0,
        ..Default::default()
    };
    assert!(store.query(&none).unwrap().is_empty());

    let missing = LogFilter {
        search_text: "zzz-not-present".into(),
        ..Default::default()
    };
    assert!(store.query(&missing).unwrap().is_empty());

    let one = LogFilter {
        search_text: "row 59".into(),
        ..Default::default()
    };
    assert_eq!(store.query(&one).unwrap(), vec![message("row 59")]);
}

#[test]
fn unopenable_path_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::new();

    let err = store
        .open(dir.path().join("missing-dir").join("logs.db"))
        .unwrap_err();
    assert!(matches!(err, Error::StoreOpen { .. }), "{err}");
    assert!(!store.is_open());
    assert!(matches!(store.write(&message("x")), Err(Error::StoreNotOpen)));
}

#[test]
fn shared_between_threads() {
    let dir = tempfile::tempdir().unwrap();
    let store = std::sync::Arc::new(LogStore::new());
    store.open(dir.path().join("logs.db")).unwrap();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..25 {
                    store.write(&message(&format!("t{t} m{i}"))).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let all = LogFilter {
        limit: 1000,
        ..Default::default()
    };
    assert_eq!(store.query(&all).unwrap().len(), 100);
}

#[test]
fn unexpected_schema_is_an_error_not_an_empty_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE logs (id INTEGER PRIMARY KEY, timestamp TEXT);")
            .unwrap();
    }

    let store = LogStore::new();
    store.open(&path).unwrap();

    let err = store.query(&LogFilter::default()).unwrap_err();
    assert!(matches!(err, Error::StoreQuery(_)), "{err}");

    let err = store.write(&message("lost")).unwrap_err();
    assert!(matches!(err, Error::StoreWrite(_)), "{err}");
}
