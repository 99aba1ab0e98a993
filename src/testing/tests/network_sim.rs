use crate::testing::NetworkSimulator;

#[test]
fn test_perfect_network_is_transparent() {
    let mut net = NetworkSimulator::perfect();
    for sent in [0, 10, 20] {
        assert_eq!(net.arrival_ns(sent), Some(sent));
    }
}

#[test]
fn test_same_seed_same_conditions() {
    let sent: Vec<(u32, i64)> = (0..200).map(|i| (i, i64::from(i) * 20_000_000)).collect();

    let a = NetworkSimulator::poor_wifi(7).deliver(sent.clone());
    let b = NetworkSimulator::poor_wifi(7).deliver(sent);
    assert_eq!(a, b);
}

#[test]
fn test_arrivals_never_go_backwards() {
    let mut net = NetworkSimulator::new(0.0, 5_000_000, 50_000_000, 42);
    let mut last = i64::MIN;
    for i in 0..500 {
        let arrival = net.arrival_ns(i * 1_000_000).unwrap();
        assert!(arrival >= last);
        assert!(arrival >= i * 1_000_000 + 5_000_000);
        last = arrival;
    }
}

#[test]
fn test_total_loss() {
    let mut net = NetworkSimulator::new(1.0, 0, 0, 1);
    assert_eq!(net.arrival_ns(0), None);
}
