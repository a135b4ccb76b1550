//! Weaving models stored on disk.

mod common;

use common::{assembly_to_process, weave};
use disposetrack::{CodeModel, Error, Weaver, WeaverConfig};

#[test]
fn weave_file_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("AssemblyToProcess.json");
    assembly_to_process().write_to_path(&path).unwrap();

    let mut model = CodeModel::from_path(&path).unwrap();
    let stats = weave(&mut model);
    model.write_to_path(&path).unwrap();

    let reloaded = CodeModel::from_path(&path).unwrap();
    assert_eq!(reloaded, model);
    assert_eq!(stats.types_patched, 8);
    assert_eq!(stats.opted_out_types, 1);
    assert_eq!(stats.markers_removed, 1);
    assert_eq!(stats.delegating_constructors_skipped, 1);
    assert!(reloaded
        .assembly_refs
        .iter()
        .any(|scope| scope.name == "DisposeTrack"));
}

#[test]
fn weaving_is_deterministic() {
    let mut first = assembly_to_process();
    let mut second = assembly_to_process();
    weave(&mut first);
    weave(&mut second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn missing_core_reference_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orphan.json");

    let mut model = assembly_to_process();
    for scope in &mut model.assembly_refs {
        if scope.name == "mscorlib" {
            scope.name = "corlib-fork".to_string();
        }
    }
    model.write_to_path(&path).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let mut loaded = CodeModel::from_path(&path).unwrap();
    let result = Weaver::new(WeaverConfig::default()).execute(&mut loaded);
    assert!(matches!(result, Err(Error::MissingCoreReference(_))));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}
