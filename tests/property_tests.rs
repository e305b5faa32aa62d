#[cfg(test)]
mod property_tests {
    use duelist::agent::{encode_state, Agent, ACTION_SIZE, STATE_SIZE};
    use duelist::config::AgentConfig;
    use duelist::network::QNetwork;
    use duelist::replay_buffer::{ReplayMemory, Transition};
    use duelist::world::{EntityState, Vec3, MAX_HEALTH};
    use ndarray::Array1;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // Strategy for generating state vectors of the agent's input size
    fn state_strategy() -> impl Strategy<Value = Array1<f32>> {
        prop::collection::vec(-10.0f32..10.0, STATE_SIZE).prop_map(Array1::from_vec)
    }

    fn entity_strategy() -> impl Strategy<Value = EntityState> {
        (
            (-50.0f32..50.0, -60.0f32..-50.0, -50.0f32..50.0),
            -10.0f32..10.0,
            0.0f32..=MAX_HEALTH,
            0.0f32..=MAX_HEALTH,
            any::<bool>(),
        )
            .prop_map(|((x, y, z), yaw, health, food, sprinting)| EntityState {
                position: Vec3::new(x, y, z),
                velocity: Vec3::ZERO,
                yaw,
                health,
                food,
                sprinting,
                alive: true,
            })
    }

    fn transition(tag: usize) -> Transition {
        Transition {
            state: Array1::from_elem(STATE_SIZE, tag as f32),
            action: tag % ACTION_SIZE,
            reward: tag as f32,
            next_state: Array1::from_elem(STATE_SIZE, tag as f32),
            terminal: false,
        }
    }

    proptest! {
        #[test]
        fn test_forward_has_one_value_per_action(seed in any::<u64>(), state in state_strategy()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let net = QNetwork::new(STATE_SIZE, ACTION_SIZE, &mut rng).unwrap();

            let first = net.forward(state.view()).unwrap();
            let second = net.forward(state.view()).unwrap();
            prop_assert_eq!(first.len(), ACTION_SIZE);
            prop_assert!(first.iter().all(|q| q.is_finite()));
            prop_assert_eq!(first, second);
        }

        #[test]
        fn test_memory_keeps_newest_in_order(capacity in 1usize..64, inserted in 0usize..200) {
            let mut memory = ReplayMemory::new(capacity);
            for tag in 0..inserted {
                memory.remember(transition(tag));
            }

            prop_assert_eq!(memory.len(), inserted.min(capacity));
            let first_kept = inserted.saturating_sub(capacity);
            let rewards: Vec<f32> = memory.iter().map(|t| t.reward).collect();
            let expected: Vec<f32> = (first_kept..inserted).map(|tag| tag as f32).collect();
            prop_assert_eq!(rewards, expected);
        }

        #[test]
        fn test_sample_never_repeats(capacity in 1usize..64, batch in 0usize..80, seed in any::<u64>()) {
            let mut memory = ReplayMemory::new(capacity);
            for tag in 0..capacity {
                memory.remember(transition(tag));
            }
            let mut rng = StdRng::seed_from_u64(seed);
            let sample = memory.sample(batch, &mut rng);

            prop_assert_eq!(sample.len(), batch.min(capacity));
            let mut tags: Vec<u32> = sample.iter().map(|t| t.reward as u32).collect();
            tags.sort_unstable();
            tags.dedup();
            prop_assert_eq!(tags.len(), batch.min(capacity));
        }

        #[test]
        fn test_epsilon_decays_monotonically_to_floor(
            decay in 0.5f32..1.0,
            floor in 0.0f32..0.5,
            rounds in 1usize..40,
        ) {
            let config = AgentConfig {
                epsilon_decay: decay,
                epsilon_min: floor,
                batch_size: 4,
                min_memory_size: 4,
                ..AgentConfig::default()
            };
            let mut agent = Agent::with_seed(&config, 17).unwrap();
            for tag in 0..8 {
                agent.remember(transition(tag)).unwrap();
            }

            let mut previous = agent.epsilon();
            for _ in 0..rounds {
                agent.learn().unwrap();
                let epsilon = agent.epsilon();
                prop_assert!(epsilon <= previous);
                prop_assert!(epsilon >= floor);
                prop_assert!(epsilon <= 1.0);
                previous = epsilon;
            }
        }

        #[test]
        fn test_encoded_state_is_normalized(
            own in entity_strategy(),
            opponent in entity_strategy(),
            previous in prop::option::of(0.0f32..100.0),
            reported in 0.0f32..=MAX_HEALTH,
        ) {
            let state = encode_state(Some(&own), Some(&opponent), previous, reported);
            prop_assert_eq!(state.len(), STATE_SIZE);
            for &index in &[0usize, 1, 2, 6] {
                prop_assert!((0.0..=1.0).contains(&state[index]), "component {} = {}", index, state[index]);
            }
            prop_assert!(state[3] >= -1.0 && state[3] <= 1.0);
            prop_assert!(state[7] == 0.0 || state[7] == 1.0);
            prop_assert_eq!(state[8], 1.0);
            prop_assert!(state[9] >= -1.0 && state[9] <= 1.0);
        }
    }
}
