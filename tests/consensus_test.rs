use phylosplit::{
    Bitmask, ConsensusConfig, ConsensusError, NewickReader, NewickWriterConfig, ParseResult,
    Rooting, SplitDistribution, TaxonNamespace, Tree, TreeParserConfig, build_consensus,
    consensus_from_splits, split_bitmasks, write_newick,
};

fn parse_all(texts: &[&str], is_rooted: bool, ns: &mut TaxonNamespace) -> Vec<Tree> {
    let rooting = if is_rooted { Rooting::Rooted } else { Rooting::Unrooted };
    let config = TreeParserConfig::default().default_rooting(rooting);
    NewickReader::new(texts.join("\n").chars(), ns, config)
        .collect::<ParseResult<Vec<Tree>>>()
        .unwrap_or_else(|err| panic!("Failed to parse {texts:?}: {err}"))
}

fn counted(texts: &[&str], is_rooted: bool, ns: &mut TaxonNamespace) -> SplitDistribution {
    let trees = parse_all(texts, is_rooted, ns);
    let mut dist = SplitDistribution::new(is_rooted);
    dist.count_splits_in(&trees, ns).unwrap();
    dist
}

fn newick(tree: &Tree, ns: &TaxonNamespace) -> String {
    write_newick(tree, ns, &NewickWriterConfig::default())
}

fn mask(bits: u64) -> Bitmask {
    Bitmask::from(bits)
}

#[test]
fn test_majority_rule_example() {
    let mut ns = TaxonNamespace::new();
    let dist = counted(&["((A,B),C);", "(A,(B,C));", "(A,(B,C));"], true, &mut ns);

    assert_eq!(dist.total_trees(), 3);
    assert!((dist.frequency(&mask(0b011)) - 1.0 / 3.0).abs() < 1e-12);
    assert!((dist.frequency(&mask(0b110)) - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(dist.frequency(&mask(0b101)), 0.0, "Unseen splits have zero frequency");

    let test_cases = vec![
        ("Strict majority", 0.51, "(A,(B,C));"),
        ("Default threshold", 0.5, "(A,(B,C));"),
        ("Unanimity", 1.0, "(A,B,C);"),
    ];

    for (name, min_frequency, expected) in test_cases {
        println!("Testing consensus threshold: {}", name);
        let config = ConsensusConfig::default().min_frequency(min_frequency);
        let tree = build_consensus(&dist, &ns, &config).unwrap();
        assert_eq!(newick(&tree, &ns), expected, "Wrong consensus for {}", name);
        assert!(tree.is_rooted(), "Consensus of rooted trees is rooted for {}", name);
        assert!(tree.split_map().is_some(), "Consensus carries its split map for {}", name);
    }
}

#[test]
fn test_ties_follow_discovery_order() {
    let test_cases = vec![
        ("AB first", ["((A,B),C);", "(A,(B,C));"], "((A,B),C);"),
        ("BC first", ["(A,(B,C));", "((A,B),C);"], "(A,(B,C));"),
    ];

    for (name, texts, expected) in test_cases {
        println!("Testing tie break: {}", name);
        let mut ns = TaxonNamespace::with_labels(["A", "B", "C"]);
        let dist = counted(&texts, true, &mut ns);
        for _ in 0..5 {
            let tree = build_consensus(&dist, &ns, &ConsensusConfig::default()).unwrap();
            assert_eq!(newick(&tree, &ns), expected, "Unstable consensus for {}", name);
        }
    }
}

#[test]
fn test_conflicting_minority_split_is_rejected() {
    let mut ns = TaxonNamespace::new();
    let dist = counted(&["((A,B),C);", "((A,B),C);", "(A,(B,C));"], true, &mut ns);
    let config = ConsensusConfig::default().min_frequency(0.3);
    let tree = build_consensus(&dist, &ns, &config).unwrap();
    assert_eq!(newick(&tree, &ns), "((A,B),C);");
}

#[test]
fn test_invalid_requests() {
    let ns = TaxonNamespace::with_labels(["A", "B", "C"]);
    let empty = SplitDistribution::new(true);
    assert_eq!(
        build_consensus(&empty, &ns, &ConsensusConfig::default()).unwrap_err(),
        ConsensusError::EmptyDistribution
    );

    let mut ns = TaxonNamespace::new();
    let dist = counted(&["((A,B),C);"], true, &mut ns);
    for min_frequency in [1.5, -0.1] {
        println!("Testing invalid frequency: {}", min_frequency);
        let config = ConsensusConfig::default().min_frequency(min_frequency);
        assert_eq!(
            build_consensus(&dist, &ns, &config).unwrap_err(),
            ConsensusError::InvalidFrequency(min_frequency)
        );
    }
}

#[test]
fn test_consensus_of_one_tree_is_the_tree() {
    let test_cases = vec![
        ("Rooted", "((A,B),(C,(D,E)));", true),
        ("Unrooted", "((A,B),(C,(D,E)));", false),
        ("Unrooted multifurcation", "(A,B,(C,D,E),(F,G));", false),
        ("Rooted caterpillar", "((((A,B),C),D),E);", true),
    ];

    for (name, input, is_rooted) in test_cases {
        for min_frequency in [0.1, 0.5, 0.51, 1.0] {
            println!("Testing identity: {} at {}", name, min_frequency);
            let mut ns = TaxonNamespace::new();
            let trees = parse_all(&[input], is_rooted, &mut ns);
            let mut dist = SplitDistribution::new(is_rooted);
            dist.count_splits(&trees[0], &ns).unwrap();

            let config = ConsensusConfig::default().min_frequency(min_frequency);
            let consensus = build_consensus(&dist, &ns, &config).unwrap();
            assert_eq!(
                split_bitmasks(&consensus, &ns).unwrap(),
                split_bitmasks(&trees[0], &ns).unwrap(),
                "Consensus differs from its only input for {}",
                name
            );
        }
    }
}

#[test]
fn test_mean_edge_lengths() {
    let test_cases = vec![
        (
            "Rooted",
            vec!["((A:1,B:1):2,C:1);", "((A:3,B:1):4,C:1);"],
            true,
            "((A:2.0,B:1.0):3.0,C:1.0);",
        ),
        (
            "Unrooted edges around the seed merge",
            vec!["((A:1,B:1):2,(C:1,D:1):3);"],
            false,
            "(A:1.0,B:1.0,(C:1.0,D:1.0):5.0);",
        ),
    ];

    for (name, texts, is_rooted, expected) in test_cases {
        println!("Testing mean edge lengths: {}", name);
        let mut ns = TaxonNamespace::new();
        let dist = counted(&texts, is_rooted, &mut ns);
        let tree = build_consensus(&dist, &ns, &ConsensusConfig::default()).unwrap();
        assert_eq!(newick(&tree, &ns), expected, "Wrong lengths for {}", name);

        let config = ConsensusConfig::default().edge_lengths(false);
        let tree = build_consensus(&dist, &ns, &config).unwrap();
        assert!(!tree.has_edge_lengths(), "Lengths were not requested for {}", name);
    }
}

#[test]
fn test_support_labels() {
    let mut ns = TaxonNamespace::new();
    let dist = counted(&["((A,B),C);", "(A,(B,C));", "(A,(B,C));"], true, &mut ns);
    let config = ConsensusConfig::default().support_labels(true).edge_lengths(false);
    let tree = build_consensus(&dist, &ns, &config).unwrap();
    assert_eq!(newick(&tree, &ns), "(A,(B,C)0.67);");

    let mut target = parse_all(&["(A,(B,C));"], true, &mut ns).remove(0);
    assert_eq!(dist.annotate_support(&mut target, &ns).unwrap(), 1);
    assert_eq!(newick(&target, &ns), "(A,(B,C)0.67);");
}

#[test]
fn test_parallel_counting_matches_sequential() {
    let texts = [
        "((A,B),(C,(D,E)));",
        "((A,C),(B,(D,E)));",
        "(A,(B,(C,(D,E))));",
        "((A,B),C,(D,E));",
        "((D,E),(C,(A,B)));",
    ];
    let mut ns = TaxonNamespace::new();
    let trees = parse_all(&texts, false, &mut ns);

    let mut parallel = SplitDistribution::new(false);
    parallel.count_splits_in(&trees, &ns).unwrap();
    let mut sequential = SplitDistribution::new(false);
    for tree in &trees {
        sequential.count_splits(tree, &ns).unwrap();
    }

    assert_eq!(parallel.total_trees(), sequential.total_trees());
    assert_eq!(parallel.len(), sequential.len());
    assert_eq!(
        parallel.splits().collect::<Vec<_>>(),
        sequential.splits().collect::<Vec<_>>(),
        "Discovery order must not depend on parallelism"
    );
    for split in sequential.splits() {
        assert_eq!(parallel.summary(split), sequential.summary(split), "Summary of {}", split);
    }
    assert_eq!(parallel.taxa_mask(), &ns.all_taxa_mask());
}

#[test]
fn test_tree_weights() {
    let mut ns = TaxonNamespace::new();
    let trees = parse_all(&["[&W 3] ((A,B),C);", "[&W 1] (A,(B,C));"], true, &mut ns);

    let mut weighted = SplitDistribution::new(true).use_tree_weights(true);
    weighted.count_splits_in(&trees, &ns).unwrap();
    assert_eq!(weighted.total_weight(), 4.0);
    assert_eq!(weighted.frequency(&mask(0b011)), 0.75);
    assert_eq!(weighted.frequency(&mask(0b110)), 0.25);
    let tree = build_consensus(&weighted, &ns, &ConsensusConfig::default().min_frequency(0.7)).unwrap();
    assert_eq!(newick(&tree, &ns), "((A,B),C);");

    let mut unweighted = SplitDistribution::new(true);
    unweighted.count_splits_in(&trees, &ns).unwrap();
    assert_eq!(unweighted.frequency(&mask(0b011)), 0.5);
    assert_eq!(unweighted.summary(&mask(0b011)).unwrap().weight(), 3.0);
}

#[test]
fn test_unrooted_trees_rooted_differently() {
    let mut ns = TaxonNamespace::new();
    let dist = counted(&["((A,B),(C,D));", "(A,B,(C,D));", "(C,D,(A,B));"], false, &mut ns);

    assert_eq!(dist.frequency(&mask(0b0011)), 1.0);
    assert_eq!(dist.split_count(&mask(0b0011)), 3, "Counted once per tree");
    assert_eq!(dist.split_count(&mask(0b1100)), 0, "Only canonical keys are stored");

    let tree = build_consensus(&dist, &ns, &ConsensusConfig::default()).unwrap();
    assert_eq!(newick(&tree, &ns), "(A,B,(C,D));");
    assert_eq!(tree.rooting(), Rooting::Unrooted);
}

#[test]
fn test_consensus_covers_only_observed_taxa() {
    let mut ns = TaxonNamespace::with_labels(["A", "B", "C", "D", "E"]);
    let dist = counted(&["((A,B),(C,D));", "((A,B),(C,D));"], true, &mut ns);
    let tree = build_consensus(&dist, &ns, &ConsensusConfig::default()).unwrap();
    assert_eq!(tree.leaf_count(), 4);
    assert_eq!(newick(&tree, &ns), "((A,B),(C,D));");
}

#[test]
fn test_tree_from_splits() {
    let ns = TaxonNamespace::with_labels(["A", "B", "C", "D"]);
    let test_cases = vec![
        ("Nested rooted clades", vec![0b0011, 0b0111], true, "(((A,B),C),D);"),
        ("Unrooted split", vec![0b0011], false, "(A,B,(C,D));"),
        ("Complements are one split", vec![0b0011, 0b1100], false, "(A,B,(C,D));"),
        ("Trivial splits are ignored", vec![0b0001, 0b1111], true, "(A,B,C,D);"),
        ("No splits", vec![], true, "(A,B,C,D);"),
    ];

    for (name, splits, is_rooted, expected) in test_cases {
        println!("Testing tree from splits: {}", name);
        let splits: Vec<Bitmask> = splits.into_iter().map(mask).collect();
        let tree = consensus_from_splits(&splits, &ns, is_rooted).unwrap();
        assert_eq!(newick(&tree, &ns), expected, "Wrong tree for {}", name);
        assert!(tree.validate().is_ok(), "Invalid tree for {}", name);
    }

    let ns = TaxonNamespace::with_labels(["A", "B", "C"]);
    let result = consensus_from_splits(&[mask(0b011), mask(0b110)], &ns, true);
    assert_eq!(result.unwrap_err(), ConsensusError::IncompatibleSplits(mask(0b011), mask(0b110)));
}
