//! Restore scanner tests.

use super::*;
use std::sync::atomic::AtomicBool;

/// Sink that accepts everything.
#[derive(Default)]
struct CollectSink {
    entries: Mutex<Vec<UploadItem>>,
}

impl RestoreSink<UploadItem> for CollectSink {
    fn restore(&self, entry: UploadItem) -> RestoreOutcome {
        self.entries.lock().push(entry);
        RestoreOutcome::Restored
    }
}

fn restart(dirs: &Dirs, max_size: usize) -> (QueueStorage<UploadItem>, RestoreReport) {
    let storage = QueueStorage::open(dirs.restore_config(max_size)).unwrap();
    let report = storage.join_restore().unwrap().expect("restore report");
    (storage, report)
}

#[test]
fn test_round_trip_after_restart() {
    let dirs = Dirs::new();
    let names = ["a", "b", "c"];
    let added: Vec<UploadItem> = names
        .iter()
        .map(|name| {
            dirs.item(name)
                .data(serde_json::json!({"name": name, "size": 42}))
        })
        .collect();
    {
        let storage = setup_queue(&dirs, 0);
        for (i, (name, item)) in names.iter().zip(&added).enumerate() {
            assert!(storage.add(item.clone()).unwrap());
            let age = Duration::from_secs(30 - 10 * i as u64);
            set_mtime(&dirs.dat(name), SystemTime::now() - age);
        }
        storage.release().unwrap();
    }

    let (storage, report) = restart(&dirs, 0);

    assert_eq!(report.restored, 3);
    assert_eq!(report.discarded, 0);
    assert!(!report.cancelled);
    assert!(!report.failed);
    assert_eq!(storage.get_all().unwrap(), added);
}

#[test]
fn test_concrete_scenario() {
    let dirs = Dirs::new();
    let a = dirs.item("a");
    let b = dirs.item("b");
    dirs.mirror_aged(&a, Duration::from_secs(60));
    dirs.mirror_aged(&b, Duration::from_secs(30));
    let garbage = dirs.spool().join("garbage.txt");
    fs::write(&garbage, "not a spool file").unwrap();
    fs::write(dirs.dat("c"), b"").unwrap();

    let (storage, report) = restart(&dirs, 0);

    assert_eq!(storage.get_all().unwrap(), vec![a, b]);
    assert!(garbage.exists());
    assert!(!dirs.dat("c").exists());
    assert_eq!(report.restored, 2);
    assert_eq!(report.discarded, 1);
}

#[test]
fn test_restore_orders_by_mtime() {
    let dirs = Dirs::new();
    // Created in name order, aged in reverse
    let items: Vec<UploadItem> = ["x", "y", "z"].iter().map(|n| dirs.item(n)).collect();
    for (i, item) in items.iter().enumerate() {
        dirs.mirror_aged(item, Duration::from_secs(10 * (i as u64 + 1)));
    }

    let (storage, _) = restart(&dirs, 0);

    let restored = storage.get_all().unwrap();
    assert_eq!(ids(&restored), vec![items[2].id, items[1].id, items[0].id]);
}

#[test]
fn test_corrupt_files_discarded() {
    let dirs = Dirs::new();
    let good = dirs.item("good");
    dirs.mirror_aged(&good, Duration::from_secs(5));
    fs::write(dirs.dat("empty"), b"").unwrap();
    fs::write(dirs.dat("junk"), b"\xc1 not an entry").unwrap();

    let (storage, report) = restart(&dirs, 0);

    assert_eq!(storage.get_all().unwrap(), vec![good]);
    assert_eq!(report.restored, 1);
    assert_eq!(report.discarded, 2);
    assert_eq!(dirs.dat_files(), vec!["good.dat"]);
}

#[test]
fn test_missing_payload_discarded() {
    let dirs = Dirs::new();
    let orphan = dirs.item("orphan");
    dirs.mirror_aged(&orphan, Duration::from_secs(5));
    fs::remove_file(&orphan.payload).unwrap();

    let (storage, report) = restart(&dirs, 0);

    assert!(storage.is_empty().unwrap());
    assert_eq!(report.discarded, 1);
    assert!(!dirs.dat("orphan").exists());
}

#[test]
fn test_capacity_rejects_newest_restored() {
    let dirs = Dirs::new();
    let old = dirs.item("old");
    let new = dirs.item("new");
    dirs.mirror_aged(&old, Duration::from_secs(20));
    dirs.mirror_aged(&new, Duration::from_secs(10));

    let (storage, report) = restart(&dirs, 1);

    assert_eq!(storage.get_all().unwrap(), vec![old]);
    assert_eq!(report.restored, 1);
    assert_eq!(report.discarded, 1);
    assert_eq!(dirs.dat_files(), vec!["old.dat"]);
}

#[test]
fn test_duplicate_id_discarded() {
    let dirs = Dirs::new();
    let first = UploadItem::with_id(99, dirs.payload("first"));
    let second = UploadItem::with_id(99, dirs.payload("second"));
    dirs.mirror_aged(&first, Duration::from_secs(20));
    dirs.mirror_aged(&second, Duration::from_secs(10));

    let (storage, report) = restart(&dirs, 0);

    assert_eq!(storage.get_all().unwrap(), vec![first]);
    assert_eq!(report.discarded, 1);
    assert_eq!(dirs.dat_files(), vec!["first.dat"]);
}

#[test]
fn test_empty_directory() {
    let dirs = Dirs::new();

    let (storage, report) = restart(&dirs, 0);

    assert!(storage.is_empty().unwrap());
    assert_eq!(report.restored, 0);
    assert_eq!(report.discarded, 0);
    assert!(!report.failed);
}

#[test]
fn test_subdirectories_ignored() {
    let dirs = Dirs::new();
    fs::create_dir(dirs.spool().join("nested.dat")).unwrap();

    let (_storage, report) = restart(&dirs, 0);

    assert_eq!(report.discarded, 0);
    assert!(dirs.spool().join("nested.dat").is_dir());
}

#[test]
fn test_missing_directory_reports_failure() {
    let dirs = Dirs::new();
    let scanner = RestoreScanner::<UploadItem>::new(dirs.spool().join("gone"));
    let sink = CollectSink::default();

    let report = scanner.scan(&sink, &AtomicBool::new(false));

    assert!(report.failed);
    assert_eq!(report.restored, 0);
    assert!(sink.entries.lock().is_empty());
}

#[test]
fn test_cancelled_scan_stops_immediately() {
    let dirs = Dirs::new();
    dirs.mirror_aged(&dirs.item("a"), Duration::from_secs(5));
    dirs.mirror_aged(&dirs.item("b"), Duration::from_secs(4));
    let scanner = RestoreScanner::<UploadItem>::new(dirs.spool());
    let sink = CollectSink::default();

    let report = scanner.scan(&sink, &AtomicBool::new(true));

    assert!(report.cancelled);
    assert_eq!(report.restored, 0);
    assert!(sink.entries.lock().is_empty());
    assert_eq!(dirs.dat_files(), vec!["a.dat", "b.dat"]);
}

#[test]
fn test_restored_ids_advance_counter() {
    let dirs = Dirs::new();
    let far = UploadItem::with_id(5_000_000, dirs.payload("far"));
    dirs.mirror_aged(&far, Duration::from_secs(5));

    let (_storage, _) = restart(&dirs, 0);

    assert!(UploadItem::new("/tmp/next").id > far.id);
}

#[test]
fn test_restore_then_live_add() {
    let dirs = Dirs::new();
    let restored = dirs.item("restored");
    dirs.mirror_aged(&restored, Duration::from_secs(5));

    let (storage, _) = restart(&dirs, 0);
    let live = dirs.item("live");
    assert!(storage.add(live.clone()).unwrap());

    assert_eq!(storage.get_all().unwrap(), vec![restored, live]);
    assert_eq!(dirs.dat_files(), vec!["live.dat", "restored.dat"]);
}

#[test]
fn test_restore_does_not_rewrite_mirror() {
    let dirs = Dirs::new();
    let item = dirs.item("a");
    let path = dirs.mirror_aged(&item, Duration::from_secs(3600));
    let before = fs::metadata(&path).unwrap().modified().unwrap();

    let (_storage, _) = restart(&dirs, 0);

    let after = fs::metadata(&path).unwrap().modified().unwrap();
    assert_eq!(before, after);
}

/// Deletes the whole spool directory while handling the first entry.
struct VanishingSink {
    dir: PathBuf,
    calls: Mutex<usize>,
}

impl RestoreSink<UploadItem> for VanishingSink {
    fn restore(&self, _entry: UploadItem) -> RestoreOutcome {
        *self.calls.lock() += 1;
        fs::remove_dir_all(&self.dir).unwrap();
        RestoreOutcome::Restored
    }
}

#[test]
fn test_directory_vanishing_mid_scan_fails() {
    let dirs = Dirs::new();
    let doomed = dirs.spool().join("doomed");
    fs::create_dir(&doomed).unwrap();
    let mirror = FileMirror::<UploadItem>::new(&doomed);
    for (i, name) in ["a", "b", "c"].iter().enumerate() {
        let path = mirror.try_write(&dirs.item(name)).unwrap();
        set_mtime(&path, SystemTime::now() - Duration::from_secs(30 - 10 * i as u64));
    }
    let sink = VanishingSink {
        dir: doomed.clone(),
        calls: Mutex::new(0),
    };

    let report = RestoreScanner::<UploadItem>::new(&doomed).scan(&sink, &AtomicBool::new(false));

    assert!(report.failed);
    assert!(!report.cancelled);
    assert_eq!(*sink.calls.lock(), 1);
    assert_eq!(report.restored, 0);
    assert_eq!(report.discarded, 0);
    assert!(!doomed.exists());
}

/// Reports every entry as owned by a live one.
struct OwnedSink;

impl RestoreSink<UploadItem> for OwnedSink {
    fn restore(&self, _entry: UploadItem) -> RestoreOutcome {
        RestoreOutcome::Superseded
    }
}

#[test]
fn test_superseded_files_kept_and_not_discarded() {
    let dirs = Dirs::new();
    dirs.mirror_aged(&dirs.item("a"), Duration::from_secs(5));
    dirs.mirror_aged(&dirs.item("b"), Duration::from_secs(4));

    let report = RestoreScanner::<UploadItem>::new(dirs.spool()).scan(&OwnedSink, &AtomicBool::new(false));

    assert_eq!(report.superseded, 2);
    assert_eq!(report.discarded, 0);
    assert_eq!(report.restored, 0);
    assert_eq!(dirs.dat_files(), vec!["a.dat", "b.dat"]);
}
