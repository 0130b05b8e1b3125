//
// uid.rs
// Dicom-Resample-rs
//
// Generates fresh DICOM UIDs for derived series and instances.
//
// Thales Matheus Mendonça Santos - November 2025

use uuid::Uuid;

/// UUID-derived UID root (PS3.5 B.2): `2.25.<uuid as decimal>`.
const UUID_ROOT: &str = "2.25";

pub fn generate_uid() -> String {
    format!("{}.{}", UUID_ROOT, Uuid::new_v4().as_u128())
}

/// A fresh UID guaranteed to differ from `previous`.
pub fn generate_uid_distinct_from(previous: Option<&str>) -> String {
    loop {
        let uid = generate_uid();
        if previous.map_or(true, |p| p.trim_end_matches('\0') != uid) {
            return uid;
        }
    }
}
