//! End-to-end scenarios: build a bento from a context, export it across
//! every supported destination form, and import it back.
use std::fs;
use std::path::Path;

use bentokit::build::{BuildConfig, ModelRef};
use bentokit::{Bento, BentoStore, Error, ModelStore, Tag};
use tempfile::{tempdir, TempDir};

fn seed_model(store: &ModelStore, tag: &str, module: &str) {
    let tag = Tag::parse(tag).unwrap();
    store
        .create(&tag, module, |dir| {
            fs::write(dir.join("weights.bin"), b"\x01\x02\x03")?;
            Ok(())
        })
        .unwrap();
}

fn make_model_store() -> (TempDir, ModelStore) {
    let dir = tempdir().unwrap();
    let store = ModelStore::open(dir.path()).unwrap();
    seed_model(&store, "model_a:v1", "model_a_module");
    seed_model(&store, "model_b:v3", "model_b_module");
    (dir, store)
}

fn make_context() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::write(
        root.join("simplebento.py"),
        "class SimpleBento:\n    pass\n",
    )
    .unwrap();
    fs::write(root.join("helper.py"), "pass\n").unwrap();
    fs::write(root.join("config.json"), "{}").unwrap();
    fs::write(root.join("somefile"), "root-level").unwrap();
    fs::write(root.join("data.storage"), "blob").unwrap();
    fs::create_dir(root.join("subdir")).unwrap();
    fs::write(root.join("subdir/somefile"), "nested").unwrap();
    fs::create_dir(root.join("subdir2")).unwrap();
    fs::write(root.join("subdir2/excluded.py"), "pass\n").unwrap();
    fs::write(root.join(".bentoignore"), "*.scratch\n").unwrap();
    fs::write(root.join("notes.scratch"), "ignored").unwrap();
    dir
}

fn build_config() -> BuildConfig {
    let mut config = BuildConfig::new("simplebento.py:SimpleBento");
    config.name = Some("testbento".to_string());
    config.include = ["*.py", "config.json", "somefile", "*dir*", ".bentoignore"]
        .map(String::from)
        .to_vec();
    config.exclude = ["*.storage", "/somefile", "/subdir2"]
        .map(String::from)
        .to_vec();
    config.labels.insert("team".to_string(), "foo".to_string());
    config
        .labels
        .insert("framework".to_string(), "pytorch".to_string());
    config.models = vec![
        ModelRef::Name("model_a:v1".to_string()),
        ModelRef::Full {
            tag: "model_b:v3".to_string(),
            alias: Some("model_b_alias".to_string()),
        },
    ];
    config
}

fn build_test_bento(ctx: &Path, models: &ModelStore) -> Bento {
    Bento::create(&build_config(), ctx, Some("1.0"), models).unwrap()
}

#[test]
fn test_built_tree_layout() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let bento = build_test_bento(ctx.path(), &models);

    assert_eq!(bento.tag(), &Tag::parse("testbento:1.0").unwrap());
    let files = bento.fs().walk().unwrap();
    assert!(files.contains(&"bento.yaml".to_string()));
    assert!(files.contains(&"README.md".to_string()));
    assert!(files.contains(&"src/simplebento.py".to_string()));
    assert!(files.contains(&"src/helper.py".to_string()));
    assert!(files.contains(&"src/config.json".to_string()));
    assert!(files.contains(&"src/.bentoignore".to_string()));
    assert!(files.contains(&"src/subdir/somefile".to_string()));
    assert!(files.contains(&"models/model_a/v1/model.yaml".to_string()));
    assert!(files.contains(&"models/model_b/v3/weights.bin".to_string()));

    // excluded by rules and by .bentoignore
    assert!(!files.iter().any(|f| f == "src/somefile"));
    assert!(!files.iter().any(|f| f.starts_with("src/subdir2")));
    assert!(!files.iter().any(|f| f.ends_with(".storage")));
    assert!(!files.iter().any(|f| f.ends_with(".scratch")));
}

#[test]
fn test_model_references_recorded_in_order() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let bento = build_test_bento(ctx.path(), &models);

    let recorded = &bento.info().models;
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].tag, Tag::parse("model_a:v1").unwrap());
    assert_eq!(recorded[0].module, "model_a_module");
    assert_eq!(recorded[0].alias, None);
    assert_eq!(recorded[1].tag, Tag::parse("model_b:v3").unwrap());
    assert_eq!(recorded[1].alias, Some("model_b_alias".to_string()));
}

#[test]
fn test_missing_model_fails_the_build() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let mut config = build_config();
    config.models.push(ModelRef::Name("ghost:v9".to_string()));

    match Bento::create(&config, ctx.path(), Some("1.0"), &models) {
        Err(Error::Build(message)) => assert!(message.contains("ghost:v9")),
        other => panic!("expected BuildError, got {:?}", other.map(|b| b.tag().clone())),
    }
}

#[test]
fn test_version_is_generated_when_absent() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let bento = Bento::create(&build_config(), ctx.path(), None, &models).unwrap();
    let version = bento.tag().version().unwrap().to_string();
    assert_eq!(version.len(), 16);
    assert!(!bento.tag().is_latest());
}

#[test]
fn test_export_bare_path_appends_extension() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let out = tempdir().unwrap();
    let bento = build_test_bento(ctx.path(), &models);

    let dest = out.path().join("testbento");
    let export_path = bento.export(dest.to_str().unwrap(), None, None).unwrap();
    assert_eq!(export_path, out.path().join("testbento.bento"));
    assert!(export_path.is_file());

    let imported = Bento::import_from(export_path.to_str().unwrap(), None).unwrap();
    assert_eq!(imported.tag(), bento.tag());
    assert_eq!(imported.info(), bento.info());
    assert!(imported.model_store().is_none());
}

#[test]
fn test_export_explicit_path_is_returned_unchanged() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let out = tempdir().unwrap();
    let bento = build_test_bento(ctx.path(), &models);

    let dest = out.path().join("testbento.bento");
    let export_path = bento.export(dest.to_str().unwrap(), None, None).unwrap();
    assert_eq!(export_path, dest);

    let imported = Bento::import_from(export_path.to_str().unwrap(), None).unwrap();
    assert_eq!(imported.tag(), bento.tag());
    assert_eq!(imported.info(), bento.info());
}

#[test]
fn test_export_into_directory_derives_name_from_tag() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let out = tempdir().unwrap();
    let bento = build_test_bento(ctx.path(), &models);

    let export_path = bento.export(out.path().to_str().unwrap(), None, None).unwrap();
    assert_eq!(export_path, out.path().join("testbento_1.0.bento"));
    assert!(export_path.is_file());
}

#[test]
fn test_export_trailing_separator_requires_existing_directory() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let out = tempdir().unwrap();
    let bento = build_test_bento(ctx.path(), &models);

    let dest = format!("{}/not-there/", out.path().display());
    match bento.export(&dest, None, None) {
        Err(Error::InvalidDestination { .. }) => {}
        other => panic!("expected InvalidDestination, got {:?}", other.err()),
    }
}

#[test]
fn test_export_missing_parent_directory_fails() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let out = tempdir().unwrap();
    let bento = build_test_bento(ctx.path(), &models);

    let dest = out.path().join("no-such-parent").join("testbento.bento");
    match bento.export(dest.to_str().unwrap(), None, None) {
        Err(Error::InvalidDestination { .. }) => {}
        other => panic!("expected InvalidDestination, got {:?}", other.err()),
    }
}

#[test]
fn test_export_gz_round_trip() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let out = tempdir().unwrap();
    let bento = build_test_bento(ctx.path(), &models);

    let export_path = bento
        .export(out.path().to_str().unwrap(), Some("gz"), None)
        .unwrap();
    assert_eq!(export_path, out.path().join("testbento_1.0.gz"));

    let imported = Bento::import_from(export_path.to_str().unwrap(), None).unwrap();
    assert_eq!(imported.info(), bento.info());
}

#[test]
fn test_export_zip_scheme_round_trip() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let out = tempdir().unwrap();
    let bento = build_test_bento(ctx.path(), &models);

    let dest = format!("zip://{}", out.path().join("testbento.zip").display());
    let export_path = bento.export(&dest, None, None).unwrap();
    assert_eq!(export_path, out.path().join("testbento.zip"));

    let imported = Bento::import_from(&dest, None).unwrap();
    assert_eq!(imported.tag(), bento.tag());
    assert_eq!(imported.info(), bento.info());

    // a bare .zip path auto-detects the format on import too
    let imported = Bento::import_from(export_path.to_str().unwrap(), None).unwrap();
    assert_eq!(imported.info(), bento.info());
}

#[test]
fn test_export_osfs_scheme() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let out = tempdir().unwrap();
    let bento = build_test_bento(ctx.path(), &models);

    let dest = format!("osfs://{}", out.path().join("by-url").display());
    let export_path = bento.export(&dest, None, None).unwrap();
    assert_eq!(export_path, out.path().join("by-url.bento"));

    let imported = Bento::import_from(export_path.to_str().unwrap(), None).unwrap();
    assert_eq!(imported.info(), bento.info());
}

#[test]
fn test_export_temp_scheme() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let bento = build_test_bento(ctx.path(), &models);

    let export_path = bento.export("temp://bentokit-test-staging", None, None).unwrap();
    assert!(export_path.starts_with(std::env::temp_dir()));
    assert!(export_path.ends_with("testbento_1.0.bento"));
    assert!(export_path.is_file());
    let _ = fs::remove_file(&export_path);
}

#[test]
fn test_export_folder_format_round_trip() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let out = tempdir().unwrap();
    let bento = build_test_bento(ctx.path(), &models);

    let export_path = bento
        .export(out.path().to_str().unwrap(), Some("folder"), None)
        .unwrap();
    assert_eq!(export_path, out.path().join("testbento_1.0"));
    assert!(export_path.join("bento.yaml").is_file());

    let imported = Bento::import_from(export_path.to_str().unwrap(), None).unwrap();
    assert_eq!(imported.info(), bento.info());
}

#[test]
fn test_export_subpath_validation() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let out = tempdir().unwrap();
    let bento = build_test_bento(ctx.path(), &models);

    match bento.export(out.path().to_str().unwrap(), None, Some("/badsubpath")) {
        Err(Error::InvalidDestination { .. }) => {}
        other => panic!("expected InvalidDestination, got {:?}", other.err()),
    }

    fs::create_dir(out.path().join("releases")).unwrap();
    let export_path = bento
        .export(out.path().to_str().unwrap(), None, Some("/releases"))
        .unwrap();
    assert_eq!(
        export_path,
        out.path().join("releases").join("testbento_1.0.bento")
    );
    assert!(export_path.is_file());
}

#[test]
fn test_repeated_exports_are_byte_identical() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let out = tempdir().unwrap();
    let bento = build_test_bento(ctx.path(), &models);

    let first = bento
        .export(out.path().join("one.bento").to_str().unwrap(), None, None)
        .unwrap();
    let second = bento
        .export(out.path().join("two.bento").to_str().unwrap(), None, None)
        .unwrap();
    assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
}

#[test]
fn test_import_then_save_materializes_models() {
    let (_mdir, models) = make_model_store();
    let ctx = make_context();
    let out = tempdir().unwrap();
    let store_dir = tempdir().unwrap();
    let bentos = BentoStore::open(store_dir.path()).unwrap();
    let bento = build_test_bento(ctx.path(), &models);

    let export_path = bento
        .export(out.path().join("testbento.bento").to_str().unwrap(), None, None)
        .unwrap();

    // drop the models locally; the archive still carries embedded copies
    models.delete(&Tag::parse("model_a:v1").unwrap()).unwrap();
    models.delete(&Tag::parse("model_b:v3").unwrap()).unwrap();

    let imported = Bento::import_from(export_path.to_str().unwrap(), None).unwrap();
    assert!(imported.model_store().is_none());

    let saved = imported.save(&bentos, &models).unwrap();
    assert!(saved.model_store().is_some());
    assert!(models.contains(&Tag::parse("model_a:v1").unwrap()));
    assert!(models.contains(&Tag::parse("model_b:v3").unwrap()));

    let restored = models.get(&Tag::parse("model_b:v3").unwrap()).unwrap();
    assert_eq!(restored.info.module, "model_b_module");
}

#[test]
fn test_import_rejects_garbage_archive() {
    let out = tempdir().unwrap();
    let path = out.path().join("garbage.bento");
    fs::write(&path, b"definitely not a tar archive").unwrap();
    match Bento::import_from(path.to_str().unwrap(), None) {
        Err(Error::CorruptArchive { .. }) => {}
        other => panic!("expected CorruptArchive, got {:?}", other.err()),
    }
}

#[test]
fn test_import_rejects_archive_without_manifest() {
    let out = tempdir().unwrap();
    // a valid directory tree that simply has no bento.yaml
    let plain = out.path().join("plain");
    fs::create_dir(&plain).unwrap();
    fs::write(plain.join("file.txt"), b"data").unwrap();
    match Bento::import_from(plain.to_str().unwrap(), None) {
        Err(Error::CorruptArchive { .. }) => {}
        other => panic!("expected CorruptArchive, got {:?}", other.err()),
    }
}
