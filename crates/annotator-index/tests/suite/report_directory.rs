use std::collections::BTreeSet;
use std::path::Path;

use annotator_core::{Location, Region};
use annotator_index::{
    files, CompoundRegionTracker, Deserializer, FieldDeclarationStore, Index, IndexKey, MethodHierarchy,
    MethodRegistry, RegionTracker, SerializationVersion,
};

fn write(dir: &Path, name: &str, text: &str) {
    std::fs::write(dir.join(name), text).unwrap();
}

#[test]
fn loads_a_complete_v1_report_directory() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("Service.java");
    std::fs::write(
        &src,
        "package app;\npublic class Service {\n  Object cache, backup;\n  public Object find(Object key) { return null; }\n}\n",
    )
    .unwrap();
    let src = src.display().to_string();

    write(dir.path(), files::CLASS_INFO, &format!("class\tpath\napp.Service\t{src}\n"));
    write(
        dir.path(),
        files::METHOD_INFO,
        &format!(
            "id\tclass\tmethod\tparent\tsize\tflags\tnullable\tvisibility\tnon_primitive\tpath\n\
             0\tapp.Service\tfind(java.lang.Object)\t-1\t1\t[false]\tfalse\tpublic\ttrue\t{src}\n"
        ),
    );
    write(
        dir.path(),
        files::CALL_GRAPH,
        "caller_class\tcaller_member\tmember\tcallee_class\napp.Client\tmain()\tfind(java.lang.Object)\tapp.Service\n",
    );
    write(
        dir.path(),
        files::ERRORS,
        &format!(
            "kind\tmessage\tclass\tmember\tk\tc\tm\tv\ti\tu\n\
             RETURN_NULLABLE\treturning @Nullable\tapp.Service\tfind(java.lang.Object)\tMETHOD\tapp.Service\tfind(java.lang.Object)\tnull\t0\t{src}\n\
             ASSIGN_FIELD_NULLABLE\tassigning @Nullable\tapp.Service\tfind(java.lang.Object)\tFIELD\tapp.Service\tnull\tcache\t0\t{src}\n\
             DEREFERENCE_NULLABLE\tderef\tapp.Client\tmain()\tnull\tnull\tnull\tnull\tnull\tnull\n"
        ),
    );

    let fields = FieldDeclarationStore::load(&[dir.path().join(files::CLASS_INFO)]).unwrap();
    let methods = MethodRegistry::load(&[dir.path().join(files::METHOD_INFO)], &[]).unwrap();

    let mut de = Deserializer::new(SerializationVersion::V1, "javax.annotation.Nullable");
    let mut errors = Index::new(IndexKey::ByMethod);
    errors
        .index(&[dir.path().join(files::ERRORS)], |row| de.deserialize_error(row, &fields))
        .unwrap();
    assert_eq!(errors.len(), 3);

    let in_find = errors.get(&Region::new("app.Service", "find(java.lang.Object)"));
    assert_eq!(in_find.len(), 2);
    let field_fix = in_find
        .iter()
        .filter_map(|e| e.resolving_fix.as_ref())
        .find(|fix| fix.is_on_field())
        .unwrap();
    assert_eq!(
        field_fix.location.field_variables().cloned(),
        Some(BTreeSet::from(["backup".to_string(), "cache".to_string()]))
    );
    let unfixable: Vec<_> = errors.iter().filter(|e| !e.is_fixable()).collect();
    assert_eq!(unfixable.len(), 1);

    let mut calls = Index::new(IndexKey::ByClass);
    calls
        .index(&[dir.path().join(files::CALL_GRAPH)], |row| de.deserialize_tracker_node(row).map(Some))
        .unwrap();
    let field_graph = Index::new(IndexKey::ByClass);
    let tracker = CompoundRegionTracker::standard(&calls, &field_graph, &methods);
    let regions = tracker
        .get_regions(&Location::method("app.Service", src.as_str(), "find(java.lang.Object)"))
        .unwrap();
    assert!(regions.contains(&Region::new("app.Client", "main()")));
    assert!(methods.declared_in_module(&Location::method("app.Service", src.as_str(), "find(java.lang.Object)")));
}
