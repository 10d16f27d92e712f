use chrono::NaiveDate;

use roc2rawsplits::domain::Punch;
use roc2rawsplits::output::RawSplitsWriter;
use roc2rawsplits::parser::parse_payload;
use roc2rawsplits::store::PunchStore;

fn punch(id: i64, code: i64, si: i64, hms: (u32, u32, u32)) -> Punch {
    Punch {
        id,
        code,
        si,
        timestamp: NaiveDate::from_ymd_opt(2023, 8, 20)
            .unwrap()
            .and_hms_opt(hms.0, hms.1, hms.2)
            .unwrap(),
    }
}

#[test]
fn merging_payload_twice_equals_once() {
    let payload = "3;31;500003;2023-08-20 10:03:00\n\
                   1;31;500001;2023-08-20 10:01:00\n\
                   3;31;500003;2023-08-20 10:03:00\n";
    let mut once = PunchStore::new();
    for punch in parse_payload(payload).into_accepted() {
        once.insert_if_absent(punch);
    }
    let mut twice = PunchStore::new();
    for _ in 0..2 {
        for punch in parse_payload(payload).into_accepted() {
            twice.insert_if_absent(punch);
        }
    }
    assert_eq!(once.len(), 2);
    assert_eq!(twice.len(), once.len());
    assert_eq!(twice.take_pending_writes(), 2);
}

#[test]
fn snapshot_serializes_in_id_order() {
    let mut store = PunchStore::new();
    store.insert_if_absent(punch(20, 100, 8002711, (15, 39, 11)));
    store.insert_if_absent(punch(7, 31, 12345, (9, 5, 0)));

    let text = RawSplitsWriter::serialize(&store.snapshot());
    assert_eq!(text, "   12345:  31/09:05:00.000\n 8002711: 100/15:39:11.000\n");
}

#[test]
fn write_replaces_whole_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = camino::Utf8PathBuf::from_path_buf(temp.path().join("raw.txt")).unwrap();
    std::fs::write(path.as_std_path(), "old content that is longer than the new one\n").unwrap();

    let text = RawSplitsWriter::serialize(&[punch(1, 2, 8002711, (15, 39, 11))]);
    RawSplitsWriter::write(&path, &text).unwrap();
    assert_eq!(
        std::fs::read_to_string(path.as_std_path()).unwrap(),
        " 8002711:   2/15:39:11.000\n"
    );
}
