mod common;

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;

use airlift_transfer::{ConnectionMode, Departure, Verdict};
use common::TestSite;

fn cancel_at_sighting(site: &mut TestSite, nth: usize) -> Arc<AtomicUsize> {
    let sightings = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&sightings);
    site.hooks
        .push_export_item_filter(Box::new(move |_item, _mode, ctx| {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 == nth {
                ctx.cancel_flag().cancel();
            }
            Verdict::Allow
        }));
    sightings
}

#[test]
fn cancellation_mid_run_stops_later_items_but_still_closes_the_bundle() {
    let mut site = TestSite::new();
    for name in ["a.txt", "b.txt", "c.txt", "d.txt", "e.txt"] {
        fs::write(site.dir.path().join(name), name.as_bytes()).unwrap();
    }

    // The export checkpoint sees each item twice, once at the top of the
    // run and once in the walk, so the fourth sighting happens while item
    // two is in flight and the flag is first noticed before item three.
    let sightings = cancel_at_sighting(&mut site, 4);

    let ctx = site.ctx();
    let summary = Departure::new(&ctx)
        .run(
            ConnectionMode::Bundle,
            "file",
            &[
                json!("a.txt"),
                json!("b.txt"),
                json!("c.txt"),
                json!("d.txt"),
                json!("e.txt"),
            ],
        )
        .unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);

    let archive_path = summary.archive.expect("bundle still closes");
    let archive = zip::ZipArchive::new(fs::File::open(&archive_path).unwrap()).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort();
    assert_eq!(names, vec!["a.txt", "b.txt"]);

    let log = fs::read_to_string(summary.log_path.unwrap()).unwrap();
    assert!(log.contains("\"ABORTED\""));
    for untouched in ["c.txt", "d.txt", "e.txt"] {
        assert!(!log.contains(untouched), "{untouched} leaked into the log");
    }
    assert_eq!(sightings.load(Ordering::SeqCst), 4);
}

#[test]
fn cancellation_inside_a_walk_keeps_what_was_already_sent() {
    let mut site = TestSite::new();
    fs::create_dir_all(site.dir.path().join("uploads")).unwrap();
    for name in ["f1.txt", "f2.txt", "f3.txt"] {
        fs::write(site.dir.path().join("uploads").join(name), name.as_bytes()).unwrap();
    }

    // Sightings: the top-level item, the uploads directory, then the first
    // leaf. The flag flips after f1 passed the checkpoint, so f1 is still
    // written and the walk stops at f2.
    let sightings = cancel_at_sighting(&mut site, 3);

    let ctx = site.ctx();
    let summary = Departure::new(&ctx)
        .run(ConnectionMode::Bundle, "file", &[json!("uploads")])
        .unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 1);
    assert!(summary.failures[0].1.starts_with("ABORTED"));

    let archive_path = summary.archive.expect("bundle still closes");
    let archive = zip::ZipArchive::new(fs::File::open(&archive_path).unwrap()).unwrap();
    let names: Vec<&str> = archive.file_names().collect();
    assert_eq!(names, vec!["uploads/f1.txt"]);
    assert_eq!(sightings.load(Ordering::SeqCst), 3);
}
