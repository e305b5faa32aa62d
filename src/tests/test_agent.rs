use ndarray::Array1;

use crate::agent::{Agent, AgentSnapshot, ACTION_SIZE, STATE_SIZE};
use crate::config::AgentConfig;
use crate::error::DuelistError;
use crate::replay_buffer::Transition;

fn agent(seed: u64) -> Agent {
    Agent::with_seed(&AgentConfig::default(), seed).unwrap()
}

fn state(value: f32) -> Array1<f32> {
    Array1::from_elem(STATE_SIZE, value)
}

fn fill(agent: &mut Agent, count: usize) {
    for i in 0..count {
        let v = i as f32 / count as f32;
        agent
            .remember(Transition {
                state: state(v),
                action: i % ACTION_SIZE,
                reward: if i % 7 == 0 { 1.0 } else { 0.0 },
                next_state: state(v + 0.01),
                terminal: i % 11 == 0,
            })
            .unwrap();
    }
}

#[test]
fn test_agent_creation() {
    let agent = agent(1);
    assert_eq!(agent.epsilon(), 1.0);
    assert_eq!(agent.memory().len(), 0);
    assert_eq!(agent.q_network().state_size(), STATE_SIZE);
    assert_eq!(agent.q_network().action_size(), ACTION_SIZE);
    assert_eq!(agent.q_network(), agent.target_network());
}

#[test]
fn test_greedy_selection_is_argmax() {
    let mut agent = agent(2);
    agent.set_epsilon(0.0);
    let s = state(0.3);
    let q = agent.q_network().forward(s.view()).unwrap();
    let mut expected = 0;
    for i in 1..q.len() {
        if q[i] > q[expected] {
            expected = i;
        }
    }
    for _ in 0..20 {
        assert_eq!(agent.select_action(s.view()).unwrap(), expected);
    }
}

#[test]
fn test_full_exploration_is_roughly_uniform() {
    let mut agent = agent(3);
    agent.set_epsilon(1.0);
    // A wrong-length state would fail if the network were consulted.
    let bogus = Array1::<f32>::zeros(3);
    let mut counts = [0usize; ACTION_SIZE];
    let trials = 9000;
    for _ in 0..trials {
        counts[agent.select_action(bogus.view()).unwrap()] += 1;
    }
    for &count in &counts {
        assert!(count > 800 && count < 1200, "counts {:?}", counts);
    }
}

#[test]
fn test_remember_validates_shapes() {
    let mut agent = agent(4);
    let bad = Transition {
        state: state(0.0),
        action: 0,
        reward: 0.0,
        next_state: Array1::zeros(3),
        terminal: false,
    };
    assert!(matches!(agent.remember(bad), Err(DuelistError::DimensionMismatch { .. })));

    let bad_action = Transition {
        state: state(0.0),
        action: ACTION_SIZE,
        reward: 0.0,
        next_state: state(0.0),
        terminal: false,
    };
    assert!(matches!(agent.remember(bad_action), Err(DuelistError::InvalidAction { .. })));
    assert!(agent.memory().is_empty());
}

#[test]
fn test_learn_is_noop_below_threshold() {
    let mut agent = agent(5);
    fill(&mut agent, 10);
    let before = agent.q_network().clone();
    let epsilon = agent.epsilon();

    assert_eq!(agent.learn().unwrap(), None);
    assert_eq!(agent.epsilon(), epsilon);
    assert_eq!(agent.q_network(), &before);
}

#[test]
fn test_learn_trains_and_decays_epsilon() {
    let mut agent = agent(6);
    fill(&mut agent, 60);
    let before = agent.q_network().clone();
    let target_before = agent.target_network().clone();

    let loss = agent.learn().unwrap().expect("enough memory to learn");
    assert!(loss.is_finite() && loss >= 0.0);
    assert_eq!(agent.epsilon(), 0.9995);
    assert_ne!(agent.q_network(), &before);
    assert_eq!(agent.target_network(), &target_before);
}

#[test]
fn test_epsilon_converges_to_floor() {
    let config = AgentConfig {
        epsilon_decay: 0.9,
        min_memory_size: 1,
        batch_size: 4,
        ..AgentConfig::default()
    };
    let mut agent = Agent::with_seed(&config, 7).unwrap();
    fill(&mut agent, 8);

    let mut previous = agent.epsilon();
    for _ in 0..200 {
        agent.learn().unwrap();
        let epsilon = agent.epsilon();
        assert!(epsilon <= previous);
        assert!(epsilon >= config.epsilon_min);
        previous = epsilon;
    }
    assert!((agent.epsilon() - config.epsilon_min).abs() < 1e-6);
}

#[test]
fn test_target_sync_copies_online() {
    let mut agent = agent(8);
    fill(&mut agent, 60);
    agent.learn().unwrap();
    assert_ne!(agent.q_network(), agent.target_network());

    agent.update_target_network();
    assert_eq!(agent.q_network(), agent.target_network());
}

#[test]
fn test_snapshot_roundtrip() {
    let mut agent = agent(9);
    fill(&mut agent, 60);
    agent.learn().unwrap();
    let probe = state(0.42);
    let expected = agent.q_network().forward(probe.view()).unwrap();

    let json = serde_json::to_string(&agent.snapshot()).unwrap();
    let snapshot: AgentSnapshot = serde_json::from_str(&json).unwrap();
    let restored = Agent::from_snapshot(snapshot, &AgentConfig::default()).unwrap();

    assert_eq!(restored.epsilon(), agent.epsilon());
    assert_eq!(restored.q_network(), agent.q_network());
    assert_eq!(restored.target_network(), agent.target_network());
    assert_eq!(restored.q_network().forward(probe.view()).unwrap(), expected);
    assert!(restored.memory().is_empty());
}

#[test]
fn test_snapshot_with_foreign_catalog_is_rejected() {
    let agent = agent(10);
    let mut snapshot = agent.snapshot();
    snapshot.actions.swap(0, 1);
    assert!(matches!(
        Agent::from_snapshot(snapshot, &AgentConfig::default()),
        Err(DuelistError::InvalidCheckpoint(_))
    ));

    let mut snapshot = agent.snapshot();
    snapshot.state_size = 12;
    assert!(Agent::from_snapshot(snapshot, &AgentConfig::default()).is_err());
}
