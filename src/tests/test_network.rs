use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::DuelistError;
use crate::network::{QNetwork, HIDDEN_SIZE};

fn network(seed: u64) -> QNetwork {
    let mut rng = StdRng::seed_from_u64(seed);
    QNetwork::new(10, 9, &mut rng).unwrap()
}

fn probe() -> Array1<f32> {
    Array1::from(vec![0.9, 1.0, 0.2, -0.4, 0.3, -0.1, 0.75, 0.0, 1.0, 0.1])
}

#[test]
fn test_network_creation() {
    let net = network(1);
    assert_eq!(net.weights1.shape(), [10, HIDDEN_SIZE]);
    assert_eq!(net.bias1.shape(), [HIDDEN_SIZE]);
    assert_eq!(net.weights2.shape(), [HIDDEN_SIZE, HIDDEN_SIZE]);
    assert_eq!(net.bias2.shape(), [HIDDEN_SIZE]);
    assert_eq!(net.weights3.shape(), [HIDDEN_SIZE, 9]);
    assert_eq!(net.bias3.shape(), [9]);
    assert_eq!(net.state_size(), 10);
    assert_eq!(net.action_size(), 9);
}

#[test]
fn test_zero_sizes_rejected() {
    let mut rng = StdRng::seed_from_u64(0);
    assert!(QNetwork::new(0, 9, &mut rng).is_err());
    assert!(QNetwork::new(10, 0, &mut rng).is_err());
}

#[test]
fn test_he_uniform_bounds() {
    let net = network(2);
    let limit1 = (2.0f32 / 10.0).sqrt();
    let limit2 = (2.0f32 / HIDDEN_SIZE as f32).sqrt();
    assert!(net.weights1.iter().all(|w| w.abs() <= limit1));
    assert!(net.weights2.iter().all(|w| w.abs() <= limit2));
    assert!(net.weights3.iter().all(|w| w.abs() <= limit2));
    assert!(net.bias1.iter().chain(net.bias3.iter()).all(|b| b.abs() <= 0.005));
}

#[test]
fn test_forward_length_and_determinism() {
    let net = network(3);
    let state = probe();
    let first = net.forward(state.view()).unwrap();
    let second = net.forward(state.view()).unwrap();
    assert_eq!(first.len(), 9);
    assert_eq!(first, second);
}

#[test]
fn test_forward_rejects_wrong_length() {
    let net = network(3);
    let state = Array1::<f32>::zeros(4);
    assert!(matches!(
        net.forward(state.view()),
        Err(DuelistError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_update_moves_prediction_toward_target() {
    let mut net = network(4);
    let state = probe();
    let before = net.forward(state.view()).unwrap()[2];
    let target = before + 10.0;

    let reported = net.update(state.view(), 2, target, 0.01).unwrap();
    assert_eq!(reported, before);

    let after = net.forward(state.view()).unwrap()[2];
    assert!((target - after).abs() < (target - before).abs());
}

#[test]
fn test_update_leaves_first_layer_and_hidden_biases() {
    let mut net = network(5);
    let original = net.clone();
    let state = probe();
    net.update(state.view(), 0, 50.0, 0.05).unwrap();

    assert_eq!(net.weights1, original.weights1);
    assert_eq!(net.bias1, original.bias1);
    assert_eq!(net.bias2, original.bias2);
    assert_ne!(net.weights3, original.weights3);
    assert_ne!(net.bias3[0], original.bias3[0]);
    // Output units for other actions are untouched.
    assert_eq!(net.weights3.column(1), original.weights3.column(1));
    assert_eq!(net.bias3[1], original.bias3[1]);
}

#[test]
fn test_update_hidden_signal_is_damped() {
    let mut net = network(6);
    let original = net.clone();
    let state = probe();
    let lr = 0.01;
    let target = 3.0;

    let h1 = (state.dot(&original.weights1) + &original.bias1).mapv(|v| v.max(0.0));
    let h2 = (h1.dot(&original.weights2) + &original.bias2).mapv(|v| v.max(0.0));
    let predicted = h2.dot(&original.weights3.column(4)) + original.bias3[4];
    let step = lr * (predicted - target);

    net.update(state.view(), 4, target, lr).unwrap();

    let unit = h2.iter().position(|&v| v > 0.0).unwrap();
    let input = h1.iter().position(|&v| v > 0.0).unwrap();
    let updated_w3 = original.weights3[[unit, 4]] - step * h2[unit];
    let expected = original.weights2[[input, unit]] - step * updated_w3 * 0.1 * h1[input];
    assert!((net.weights2[[input, unit]] - expected).abs() < 1e-6);

    if let Some(inactive) = h2.iter().position(|&v| v <= 0.0) {
        assert_eq!(net.weights2.column(inactive), original.weights2.column(inactive));
    }
}

#[test]
fn test_update_rejects_invalid_action() {
    let mut net = network(7);
    let state = probe();
    assert!(matches!(
        net.update(state.view(), 9, 1.0, 0.01),
        Err(DuelistError::InvalidAction { action: 9, max_actions: 9 })
    ));
}

#[test]
fn test_clone_is_independent() {
    let mut original = network(8);
    let copy = original.clone();
    let state = probe();
    assert_eq!(original.forward(state.view()).unwrap(), copy.forward(state.view()).unwrap());

    let frozen = copy.forward(state.view()).unwrap();
    for _ in 0..5 {
        original.update(state.view(), 1, 100.0, 0.1).unwrap();
    }
    assert_eq!(copy.forward(state.view()).unwrap(), frozen);
    assert_ne!(original.forward(state.view()).unwrap(), frozen);
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.bin");
    let net = network(9);
    net.save(&path).unwrap();

    let loaded = QNetwork::load(&path).unwrap();
    assert_eq!(loaded, net);
    let state = probe();
    assert_eq!(loaded.forward(state.view()).unwrap(), net.forward(state.view()).unwrap());
}

#[test]
fn test_json_roundtrip_is_exact() {
    let net = network(10);
    let json = serde_json::to_string(&net).unwrap();
    let restored: QNetwork = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, net);
}

#[test]
fn test_validate_rejects_inconsistent_shapes() {
    let mut net = network(11);
    net.validate().unwrap();
    net.bias2 = Array1::zeros(HIDDEN_SIZE - 1);
    assert!(matches!(net.validate(), Err(DuelistError::DimensionMismatch { .. })));

    let mut net = network(11);
    net.weights2 = Array2::zeros((HIDDEN_SIZE, 3));
    assert!(net.validate().is_err());

    let mut net = network(11);
    net.weights3[[0, 0]] = f32::NAN;
    assert!(matches!(net.validate(), Err(DuelistError::InvalidCheckpoint(_))));
}
