mod common {
    use crate::core::db::Database;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    pub(super) fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(&temp_dir.path().join("store.redb")).unwrap();
        (db, temp_dir)
    }

    pub(super) fn base_time() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    pub(super) const HOUR: Duration = Duration::from_secs(60 * 60);
}

mod values {
    use super::common::{HOUR, base_time, create_test_db};
    use crate::core::kv::KvStore;
    use std::time::Duration;

    #[test]
    fn test_set_ex_then_get() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        KvStore::set_ex(&db, "addr:room42", b"record", HOUR, now).unwrap();

        assert_eq!(
            db.get("addr:room42", now).unwrap(),
            Some(b"record".to_vec())
        );
        assert!(db.exists("addr:room42", now).unwrap());
    }

    #[test]
    fn test_get_missing_key() {
        let (db, _temp) = create_test_db();
        assert_eq!(db.get("addr:nothing", base_time()).unwrap(), None);
        assert!(!db.exists("addr:nothing", base_time()).unwrap());
    }

    #[test]
    fn test_value_elapses_after_ttl() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        KvStore::set_ex(&db, "k", b"v", HOUR, now).unwrap();

        let just_before = now + HOUR - Duration::from_millis(1);
        assert!(db.exists("k", just_before).unwrap());

        let at_expiry = now + HOUR;
        assert!(!db.exists("k", at_expiry).unwrap());
        assert_eq!(db.get("k", at_expiry).unwrap(), None);
    }

    #[test]
    fn test_set_without_ttl_never_elapses() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        KvStore::set(&db, "meta:sweep", b"{}", now).unwrap();

        let far_future = now + Duration::from_secs(10 * 365 * 24 * 60 * 60);
        assert!(db.exists("meta:sweep", far_future).unwrap());
        assert!(db.expiry_entries().unwrap().is_empty());
    }

    #[test]
    fn test_set_ex_overwrites_and_reindexes() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        KvStore::set_ex(&db, "k", b"first", HOUR, now).unwrap();
        KvStore::set_ex(&db, "k", b"second", HOUR * 2, now).unwrap();

        assert_eq!(db.get("k", now + HOUR).unwrap(), Some(b"second".to_vec()));
        assert_eq!(db.expiry_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        KvStore::set_ex(&db, "k", b"v", HOUR, now).unwrap();

        assert!(db.delete("k", now).unwrap());
        assert!(!db.delete("k", now).unwrap());
        assert!(!db.exists("k", now).unwrap());
        assert!(db.expiry_entries().unwrap().is_empty());
    }

    #[test]
    fn test_delete_elapsed_key_reports_absent() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        KvStore::set_ex(&db, "k", b"v", HOUR, now).unwrap();
        assert!(!db.delete("k", now + HOUR * 2).unwrap());
    }
}

mod sets {
    use super::common::{HOUR, base_time, create_test_db};
    use crate::core::db::error::DatabaseError;
    use crate::core::kv::KvStore;

    #[test]
    fn test_sadd_and_smembers() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        assert!(db.sadd("texts:room42", "a", now).unwrap());
        assert!(db.sadd("texts:room42", "b", now).unwrap());
        assert!(!db.sadd("texts:room42", "a", now).unwrap());

        let mut members = db.smembers("texts:room42", now).unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
        assert!(db.exists("texts:room42", now).unwrap());
    }

    #[test]
    fn test_smembers_of_missing_set_is_empty() {
        let (db, _temp) = create_test_db();
        assert!(db.smembers("texts:none", base_time()).unwrap().is_empty());
    }

    #[test]
    fn test_srem_last_member_removes_set() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        db.sadd("files:room42", "a", now).unwrap();
        assert!(db.srem("files:room42", "a", now).unwrap());
        assert!(!db.srem("files:room42", "a", now).unwrap());
        assert!(!db.exists("files:room42", now).unwrap());
    }

    #[test]
    fn test_expire_applies_to_set() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        db.sadd("texts:room42", "a", now).unwrap();
        assert!(db.expire("texts:room42", HOUR, now).unwrap());

        assert!(db.exists("texts:room42", now + HOUR / 2).unwrap());
        assert!(!db.exists("texts:room42", now + HOUR).unwrap());
        assert!(db.smembers("texts:room42", now + HOUR).unwrap().is_empty());
    }

    #[test]
    fn test_sadd_after_set_elapsed_starts_fresh() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        db.sadd("texts:room42", "old", now).unwrap();
        db.expire("texts:room42", HOUR, now).unwrap();

        let later = now + HOUR * 2;
        assert!(db.sadd("texts:room42", "new", later).unwrap());
        assert_eq!(
            db.smembers("texts:room42", later).unwrap(),
            vec!["new".to_string()]
        );
        assert!(db.expiry_entries().unwrap().is_empty());
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        KvStore::set_ex(&db, "k", b"v", HOUR, now).unwrap();
        assert!(matches!(
            db.sadd("k", "member", now),
            Err(DatabaseError::WrongType(_))
        ));

        db.sadd("s", "member", now).unwrap();
        assert!(matches!(db.get("s", now), Err(DatabaseError::WrongType(_))));
    }
}

mod expiry {
    use super::common::{HOUR, base_time, create_test_db};
    use crate::core::kv::KvStore;

    #[test]
    fn test_expire_missing_key_returns_false() {
        let (db, _temp) = create_test_db();
        assert!(!db.expire("nothing", HOUR, base_time()).unwrap());
    }

    #[test]
    fn test_expire_extends_value_lifetime() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        KvStore::set_ex(&db, "k", b"v", HOUR, now).unwrap();
        let touch_at = now + HOUR / 2;
        assert!(db.expire("k", HOUR, touch_at).unwrap());

        assert_eq!(db.get("k", now + HOUR).unwrap(), Some(b"v".to_vec()));
        assert!(!db.exists("k", touch_at + HOUR).unwrap());

        let entries = db.expiry_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp, touch_at + HOUR);
    }

    #[test]
    fn test_expire_many_renews_live_keys_in_order() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        KvStore::set_ex(&db, "item", b"v", HOUR, now).unwrap();
        db.sadd("list", "item", now).unwrap();
        db.expire("list", HOUR, now).unwrap();
        KvStore::set_ex(&db, "stale", b"v", HOUR / 4, now).unwrap();

        let touch_at = now + HOUR / 2;
        let keys = ["item", "missing", "list", "stale"].map(String::from);
        let renewed = db.expire_many(&keys, HOUR, touch_at).unwrap();

        assert_eq!(renewed, vec![true, false, true, false]);
        assert!(db.exists("item", now + HOUR).unwrap());
        assert!(db.exists("list", now + HOUR).unwrap());
        assert!(!db.exists("item", touch_at + HOUR).unwrap());
        assert_eq!(db.expiry_entries().unwrap().len(), 3);
    }

    #[test]
    fn test_purge_expired_removes_only_elapsed_keys() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        KvStore::set_ex(&db, "short", b"v", HOUR, now).unwrap();
        KvStore::set_ex(&db, "long", b"v", HOUR * 3, now).unwrap();
        db.sadd("set", "m", now).unwrap();
        db.expire("set", HOUR, now).unwrap();
        KvStore::set(&db, "forever", b"v", now).unwrap();

        let mut purged = db.purge_expired(now + HOUR * 2).unwrap();
        purged.sort();
        assert_eq!(purged, vec!["set".to_string(), "short".to_string()]);

        // Physically gone: even a read "in the past" no longer sees them.
        assert_eq!(db.get("short", now).unwrap(), None);
        assert!(db.smembers("set", now).unwrap().is_empty());
        assert!(db.exists("long", now).unwrap());
        assert!(db.exists("forever", now).unwrap());
        assert_eq!(db.expiry_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_purge_expired_with_nothing_elapsed() {
        let (db, _temp) = create_test_db();
        let now = base_time();

        KvStore::set_ex(&db, "k", b"v", HOUR, now).unwrap();
        assert!(db.purge_expired(now).unwrap().is_empty());
        assert!(db.exists("k", now).unwrap());
    }
}

mod reopen {
    use super::common::{HOUR, base_time};
    use crate::core::db::Database;
    use crate::core::kv::KvStore;
    use tempfile::TempDir;

    #[test]
    fn test_data_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("store.redb");
        let now = base_time();

        {
            let db = Database::open(&path).unwrap();
            KvStore::set_ex(&db, "addr:room42", b"record", HOUR, now).unwrap();
            db.sadd("texts:room42", "a", now).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(
            db.get("addr:room42", now).unwrap(),
            Some(b"record".to_vec())
        );
        assert_eq!(db.smembers("texts:room42", now).unwrap(), vec!["a".to_string()]);
    }
}
