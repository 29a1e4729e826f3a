//! Tests for union_find module

use traceclean::UnionFind;

#[test]
fn test_basic_operations() {
    let mut uf: UnionFind<i32> = UnionFind::new();

    uf.make_set(1);
    uf.make_set(2);
    uf.make_set(3);

    assert!(!uf.connected(&1, &2));

    uf.union(&1, &2);
    assert!(uf.connected(&1, &2));
    assert!(!uf.connected(&1, &3));
}

#[test]
fn test_path_compression() {
    let mut uf: UnionFind<i32> = UnionFind::new();

    uf.make_set(1);
    uf.make_set(2);
    uf.make_set(3);
    uf.make_set(4);

    uf.union(&1, &2);
    uf.union(&2, &3);
    uf.union(&3, &4);

    // After find, all should resolve to the same root
    let root = uf.find(&1);
    assert_eq!(uf.find(&2), root);
    assert_eq!(uf.find(&3), root);
    assert_eq!(uf.find(&4), root);
}

#[test]
fn test_find_registers_unknown_elements() {
    let mut uf: UnionFind<i32> = UnionFind::new();
    assert_eq!(uf.find(&7), 7);
    assert!(uf.connected(&7, &7));
}

#[test]
fn test_groups() {
    let mut uf: UnionFind<String> = UnionFind::new();

    uf.make_set("a".to_string());
    uf.make_set("b".to_string());
    uf.make_set("c".to_string());
    uf.make_set("d".to_string());

    uf.union(&"a".to_string(), &"b".to_string());
    uf.union(&"c".to_string(), &"d".to_string());

    let groups = uf.groups();
    assert_eq!(groups.len(), 2);
}

#[test]
fn test_groups_deterministic() {
    // Run multiple times - results should be identical
    let results: Vec<_> = (0..5)
        .map(|_| {
            let mut uf: UnionFind<String> = UnionFind::new();

            // Add in an order different from the sort order
            uf.make_set("d".to_string());
            uf.make_set("a".to_string());
            uf.make_set("c".to_string());
            uf.make_set("b".to_string());

            uf.union(&"a".to_string(), &"b".to_string());
            uf.union(&"c".to_string(), &"d".to_string());

            uf.groups()
        })
        .collect();

    for i in 1..results.len() {
        assert_eq!(
            results[0].len(),
            results[i].len(),
            "Different group counts on run {i}"
        );

        for (root, members) in &results[0] {
            let other_members = results[i].get(root);
            assert!(other_members.is_some(), "Missing group {root} on run {i}");
            assert_eq!(
                members,
                other_members.unwrap(),
                "Different members for group {root} on run {i}"
            );
        }
    }
}

#[test]
fn test_groups_members_sorted() {
    let mut uf: UnionFind<String> = UnionFind::new();

    uf.make_set("z".to_string());
    uf.make_set("m".to_string());
    uf.make_set("a".to_string());

    uf.union(&"z".to_string(), &"a".to_string());
    uf.union(&"z".to_string(), &"m".to_string());

    let groups = uf.groups();
    assert_eq!(groups.len(), 1);

    let members = groups.values().next().unwrap();
    let mut sorted = members.clone();
    sorted.sort();
    assert_eq!(
        members, &sorted,
        "Members should be sorted, got {:?}",
        members
    );
}
