use phylosplit::{
    EdgeLength, NewickWriterConfig, NodeId, Rooting, TaxonNamespace, Tree, TreeError,
    compute_masks, encode_splits, parse_newick, split_bitmasks, write_newick,
};

fn parse_one(text: &str, ns: &mut TaxonNamespace) -> Tree {
    let mut trees = parse_newick(text, ns)
        .unwrap_or_else(|err| panic!("Failed to parse {text:?}: {err}"));
    trees.remove(0)
}

fn newick(tree: &Tree, ns: &TaxonNamespace) -> String {
    write_newick(tree, ns, &NewickWriterConfig::default())
}

fn node(tree: &Tree, ns: &TaxonNamespace, label: &str) -> NodeId {
    tree.node_id_by_label(label, ns)
        .unwrap_or_else(|| panic!("No node labelled {label}"))
}

fn names(tree: &Tree, ns: &TaxonNamespace, node_ids: impl Iterator<Item = NodeId>) -> Vec<String> {
    node_ids
        .map(|node_id| {
            tree.taxon(node_id)
                .and_then(|taxon_id| ns.label(taxon_id))
                .map(str::to_string)
                .or_else(|| tree.label(node_id).map(|l| l.to_string()))
                .unwrap_or_default()
        })
        .collect()
}

#[test]
fn test_tree_counts() {
    let test_cases = vec![
        ("Bifurcating", "((A,B),(C,D));", 7, 4, 3),
        ("Multifurcating", "(A,B,(C,D,E));", 7, 5, 2),
        ("Single leaf", "A;", 1, 1, 0),
        ("Deep caterpillar", "((((A,B),C),D),E);", 9, 5, 4),
    ];

    for (name, input, nodes, leaves, internal) in test_cases {
        println!("Testing counts: {}", name);
        let mut ns = TaxonNamespace::new();
        let tree = parse_one(input, &mut ns);
        assert_eq!(tree.node_count(), nodes, "Node count for {}", name);
        assert_eq!(tree.leaf_count(), leaves, "Leaf count for {}", name);
        assert_eq!(tree.internal_node_count(), internal, "Internal count for {}", name);
        assert_eq!(tree.edge_count(), nodes - 1, "Edge count for {}", name);
        assert!(tree.validate().is_ok(), "Invalid tree for {}", name);
    }
}

#[test]
fn test_tree_heights() {
    let test_cases = vec![
        ("Ultrametric", "((A:1,B:1):1,(C:1,D:1):1);", 2.0),
        ("Uneven", "((A:0.1,B:0.2):0.8,C:1.0);", 1.0),
        ("Root edge ignored", "((A:1,B:2):3,C:1):10;", 5.0),
        ("No lengths", "((A,B),C);", 0.0),
    ];

    for (name, input, expected) in test_cases {
        println!("Testing height: {}", name);
        let mut ns = TaxonNamespace::new();
        let tree = parse_one(input, &mut ns);
        assert!(
            (tree.height() - expected).abs() < 1e-9,
            "Height for {}: expected {}, got {}",
            name,
            expected,
            tree.height()
        );
    }
}

#[test]
fn test_lengths_and_distances() {
    let mut ns = TaxonNamespace::new();
    let tree = parse_one("((A:0.1,B:0.2):0.8,C:1.0);", &mut ns);
    let (a, b, c) = (node(&tree, &ns, "A"), node(&tree, &ns, "B"), node(&tree, &ns, "C"));

    assert!(tree.has_edge_lengths());
    assert!(!tree.has_internal_node_labels());
    assert!((tree.length() - 2.1).abs() < 1e-9);
    assert!((tree.distance(a, c) - 1.9).abs() < 1e-9);
    assert!((tree.distance(a, b) - 0.3).abs() < 1e-9);
    assert_eq!(tree.distance(a, a), 0.0);
    assert_eq!(tree.mrca(a, b), tree.parent_id(a).unwrap());
    assert_eq!(tree.mrca(a, c), tree.seed_node_id());
}

#[test]
fn test_traversal_orders() {
    let mut ns = TaxonNamespace::new();
    let tree = parse_one("((A,B)X,(C,D)Y)R;", &mut ns);

    assert_eq!(names(&tree, &ns, tree.preorder()), ["R", "X", "A", "B", "Y", "C", "D"]);
    assert_eq!(names(&tree, &ns, tree.postorder()), ["A", "B", "X", "C", "D", "Y", "R"]);
    assert_eq!(names(&tree, &ns, tree.level_order()), ["R", "X", "Y", "A", "B", "C", "D"]);
    assert_eq!(names(&tree, &ns, tree.leaves()), ["A", "B", "C", "D"]);

    let y = node(&tree, &ns, "Y");
    let d = node(&tree, &ns, "D");
    assert_eq!(names(&tree, &ns, tree.ancestors(d)), ["Y", "R"]);
    assert_eq!(names(&tree, &ns, tree.preorder_from(y)), ["Y", "C", "D"]);
    assert_eq!(names(&tree, &ns, tree.leaves_from(y)), ["C", "D"]);
    assert!(tree.has_internal_node_labels());
}

#[test]
fn test_building_by_hand() {
    let mut ns = TaxonNamespace::with_labels(["A", "B", "C"]);
    ns.lock();
    let (a, b, c) = (ns.find("A").unwrap(), ns.find("B").unwrap(), ns.find("C").unwrap());

    let mut tree = Tree::new();
    let seed = tree.seed_node_id();
    _ = tree.add_leaf(seed, a, 1.0).unwrap();
    let inner = tree.new_child(seed).unwrap();
    _ = tree.add_leaf(inner, b, 2.0).unwrap();
    _ = tree.add_leaf(inner, c, EdgeLength::Unspecified).unwrap();
    if let Some(node) = tree.node_mut(inner) {
        node.set_edge_length(0.5);
        node.set_label(Some("BC"));
    }

    assert!(tree.validate().is_ok());
    assert_eq!(newick(&tree, &ns), "(A:1.0,(B:2.0,C)BC:0.5);");
    assert_eq!(tree.leaf_taxa(), vec![a, b, c]);

    let missing = tree.add_leaf(inner, a, 1.0).unwrap();
    tree.prune_leaf(missing, false).unwrap();
    assert_eq!(
        tree.new_child(missing),
        Err(TreeError::ParentNodeDoesNotExist(missing)),
        "Removed nodes cannot receive children"
    );
}

#[test]
fn test_editing_operations() {
    type Edit = fn(&mut Tree, &TaxonNamespace);
    let test_cases: Vec<(&str, &str, Edit, &str)> = vec![
        (
            "Collapse internal edge",
            "((A,B),C);",
            (|tree: &mut Tree, ns: &TaxonNamespace| {
                let a = tree.node_id_by_label("A", ns).unwrap();
                tree.collapse_edge(tree.parent_id(a).unwrap()).unwrap();
            }) as Edit,
            "(A,B,C);",
        ),
        (
            "Suppress unifurcation",
            "((A:2):1,B:1);",
            (|tree: &mut Tree, _: &TaxonNamespace| assert_eq!(tree.suppress_unifurcations(), 1)) as Edit,
            "(A:3.0,B:1.0);",
        ),
        (
            "Deroot",
            "((A:1,B:1):2,(C:1,D:1):3);",
            (|tree: &mut Tree, _: &TaxonNamespace| tree.deroot().unwrap()) as Edit,
            "((A:1.0,B:1.0):5.0,C:1.0,D:1.0);",
        ),
        (
            "Reroot at internal node",
            "((A:1,B:2)X:3,(C:4,D:5)Y:6)R;",
            (|tree: &mut Tree, ns: &TaxonNamespace| {
                let x = tree.node_id_by_label("X", ns).unwrap();
                tree.reroot_at(x, true).unwrap();
            }) as Edit,
            "(A:1.0,B:2.0,(C:4.0,D:5.0)Y:9.0)X;",
        ),
        (
            "Root with outgroup",
            "(A:1,B:1,(C:1,D:1):2);",
            (|tree: &mut Tree, ns: &TaxonNamespace| {
                let a = tree.node_id_by_label("A", ns).unwrap();
                _ = tree.root_with_outgroup(a).unwrap();
            }) as Edit,
            "(A:0.5,(B:1.0,(C:1.0,D:1.0):2.0):0.5);",
        ),
        (
            "Prune leaf",
            "(A,B,(C,D));",
            (|tree: &mut Tree, ns: &TaxonNamespace| {
                let a = tree.node_id_by_label("A", ns).unwrap();
                tree.prune_leaf(a, true).unwrap();
            }) as Edit,
            "(B,(C,D));",
        ),
        (
            "Prune leaf and suppress parent",
            "((A:1,B:1):1,C:1);",
            (|tree: &mut Tree, ns: &TaxonNamespace| {
                let a = tree.node_id_by_label("A", ns).unwrap();
                tree.prune_leaf(a, true).unwrap();
            }) as Edit,
            "(B:2.0,C:1.0);",
        ),
        (
            "Prune taxa",
            "((A,B),(C,D),E);",
            (|tree: &mut Tree, ns: &TaxonNamespace| {
                let taxa = [ns.find("C").unwrap(), ns.find("D").unwrap()];
                assert_eq!(tree.prune_taxa(&taxa, false).unwrap(), 2);
            }) as Edit,
            "((A,B),E);",
        ),
        (
            "Ladderize",
            "((A,(B,C)),D);",
            (|tree: &mut Tree, _: &TaxonNamespace| tree.ladderize(false)) as Edit,
            "(D,(A,(B,C)));",
        ),
        (
            "Ladderize reversed",
            "((A,(B,C)),D);",
            (|tree: &mut Tree, _: &TaxonNamespace| tree.ladderize(true)) as Edit,
            "(((B,C),A),D);",
        ),
    ];

    for (name, input, edit, expected) in test_cases {
        println!("Testing edit: {}", name);
        let mut ns = TaxonNamespace::new();
        let mut tree = parse_one(input, &mut ns);
        edit(&mut tree, &ns);
        assert_eq!(newick(&tree, &ns), expected, "Wrong result for {}", name);
        assert!(tree.validate().is_ok(), "Invalid tree after {}", name);
    }
}

#[test]
fn test_rooting_changes() {
    let mut ns = TaxonNamespace::new();
    let mut tree = parse_one("[&R] (A:1,B:1,(C:1,D:1):2);", &mut ns);
    assert!(tree.is_rooted());
    tree.deroot().unwrap();
    assert_eq!(tree.rooting(), Rooting::Unrooted, "Deroot always unroots");

    let a = node(&tree, &ns, "A");
    let seed = tree.root_with_outgroup(a).unwrap();
    assert_eq!(seed, tree.seed_node_id());
    assert!(tree.is_rooted());
    assert_eq!(tree.child_count(seed), 2);

    let again = tree.root_with_outgroup(a).unwrap();
    assert_eq!(again, seed, "Rooting on the current outgroup changes nothing");
}

#[test]
fn test_editing_errors() {
    let mut ns = TaxonNamespace::new();
    let mut tree = parse_one("((A,B)X,C);", &mut ns);
    let a = node(&tree, &ns, "A");
    let x = node(&tree, &ns, "X");
    let seed = tree.seed_node_id();

    assert_eq!(tree.collapse_edge(a), Err(TreeError::NotAnInternalEdge(a)));
    assert_eq!(tree.collapse_edge(seed), Err(TreeError::NotAnInternalEdge(seed)));
    assert_eq!(tree.prune_leaf(x, false), Err(TreeError::NotALeaf(x)));
    assert_eq!(tree.root_with_outgroup(seed), Err(TreeError::InvalidOutgroupNode(seed)));
}

#[test]
fn test_reroot_at_leaf_is_rejected() {
    let mut ns = TaxonNamespace::new();
    let mut tree = parse_one("((A:1,B:2)X:3,C:4);", &mut ns);
    _ = encode_splits(&mut tree, &ns).unwrap();
    let before = newick(&tree, &ns);
    let a = node(&tree, &ns, "A");
    let seed = tree.seed_node_id();

    assert!(matches!(tree.reroot_at(a, false), Err(TreeError::InvalidRerootTarget(id, _)) if id == a));
    assert_eq!(tree.seed_node_id(), seed, "The seed node is unchanged");
    assert_eq!(newick(&tree, &ns), before, "The tree is unchanged");
    assert!(tree.split_map().is_some(), "The split map is kept");

    _ = tree.root_with_outgroup(a).unwrap();
    assert_eq!(tree.parent_id(a), Some(tree.seed_node_id()), "Outgroup rooting places a leaf next to the seed");
}

#[test]
fn test_rerooting_preserves_splits() {
    let test_cases = vec![
        ("Bifurcating", "(((A,B),C),(D,(E,F)));", "C"),
        ("Multifurcating", "(A,B,(C,(D,E),F));", "D"),
        ("With lengths", "((A:1,B:2):3,(C:4,(D:5,E:6):7):8);", "E"),
    ];

    for (name, input, target) in test_cases {
        println!("Testing reroot: {}", name);
        let mut ns = TaxonNamespace::new();
        let mut tree = parse_one(input, &mut ns);
        let before = split_bitmasks(&tree, &ns).unwrap();
        _ = encode_splits(&mut tree, &ns).unwrap();

        let leaf = node(&tree, &ns, target);
        let new_seed = tree.parent_id(leaf).unwrap();
        tree.reroot_at(new_seed, true).unwrap();
        assert_eq!(tree.seed_node_id(), new_seed);
        assert!(tree.validate().is_ok(), "Invalid tree after rerooting {}", name);

        let masks = compute_masks(&tree, &ns).unwrap();
        for node_id in tree.preorder() {
            assert_eq!(tree.bitmask(node_id), masks.get(&node_id), "Stale mask in {}", name);
        }
        assert_eq!(split_bitmasks(&tree, &ns).unwrap(), before, "Splits changed in {}", name);
        let mut keys: Vec<_> = tree.split_map().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, before, "Split map out of date in {}", name);
    }
}

#[test]
fn test_taxon_namespace() {
    let mut ns = TaxonNamespace::with_labels(["A", "B"]);
    assert_eq!(ns.len(), 2);
    assert!(ns.is_mutable());

    let c = ns.require_taxon("C").unwrap();
    assert_eq!(ns.bit_index(c), Some(2));
    assert_eq!(ns.taxon_at(2), Some(c));
    assert_eq!(ns.require_taxon("A"), ns.find("A"));

    let second_a = ns.add_taxon("A");
    assert_ne!(Some(second_a), ns.find("A"), "Taxa are distinct by identity, not by label");
    assert_eq!(ns.find_all("A").len(), 2);
    assert_eq!(ns.label(second_a), Some("A"));

    ns.lock();
    assert!(!ns.is_mutable());
    assert_eq!(ns.require_taxon("Z"), None);
    assert_eq!(ns.len(), 4);

    let mask = ns.bitmask_for(&[c, second_a]);
    assert_eq!(mask, phylosplit::Bitmask::from(0b1100u64));
    assert_eq!(ns.taxa_in(&mask), vec![c, second_a]);
    assert_eq!(ns.labels_in(&mask), vec!["C", "A"]);
    assert_eq!(ns.all_taxa_mask(), phylosplit::Bitmask::from(0b1111u64));

    ns.unlock();
    assert!(ns.require_taxon("Z").is_some());
}
