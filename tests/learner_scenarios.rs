use bug_explorer::{
    ActionSpace, Error, ExperienceStore, Learner, LearnerConfig, TrainOutcome, Transition,
    runner::run_episode,
    world::{BugWorld, WorldConfig},
    Environment, FeatureSelection,
};

fn small_learner(capacity: usize, batch_size: usize) -> Learner {
    Learner::new(
        3,
        ActionSpace::Discrete { n: 2 },
        LearnerConfig {
            capacity,
            batch_size,
            seed: Some(5),
            ..Default::default()
        },
    )
    .expect("valid learner")
}

#[test]
fn single_update_on_five_transitions() {
    let mut learner = small_learner(5, 2);
    for i in 0..5 {
        let s = vec![i as f32; 3];
        let s2 = vec![(i + 1) as f32; 3];
        learner
            .store_transition(&s, i % 2, i as f32, &s2, i == 4)
            .expect("transition fits");
    }
    assert_eq!(learner.store().len(), 5);

    let before = learner.online_parameters().unwrap();
    let outcome = learner.train().expect("train succeeds");
    assert!(matches!(outcome, TrainOutcome::Updated { .. }));

    let after = learner.online_parameters().unwrap();
    assert_ne!(after, before, "a gradient step should move the weights");
    assert_eq!(learner.target_parameters().unwrap(), after);
}

#[test]
fn store_keeps_only_the_newest_transitions() {
    let mut learner = small_learner(5, 2);
    for i in 0..12 {
        let s = vec![i as f32; 3];
        learner.store_transition(&s, 0, i as f32, &s, false).unwrap();
        assert!(learner.store().len() <= 5);
    }
    let rewards: Vec<f32> = learner.store().iter().map(|t| t.reward).collect();
    assert_eq!(rewards, vec![7.0, 8.0, 9.0, 10.0, 11.0]);
}

#[test]
fn direct_sampling_reports_insufficient_data() {
    let mut store = ExperienceStore::seeded(10, 9);
    for i in 0..3 {
        store
            .push(Transition::new(vec![i as f32], 0, 0.0, vec![0.0], false))
            .unwrap();
    }
    let err = store.sample(4).unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientData {
            requested: 4,
            available: 3
        }
    ));
    assert_eq!(store.sample(3).unwrap().len(), 3);
}

#[test]
fn default_learner_matches_reference_settings() {
    let learner = Learner::discrete(4, 3).unwrap();
    assert_eq!(learner.store().capacity(), 1000);
    assert_eq!(learner.batch_size(), 32);
    assert_eq!(learner.gamma(), 0.99);
    assert_eq!(learner.epsilon(), 1.0);
    assert_eq!(learner.action_count(), 3);
}

#[test]
fn trains_against_the_scripted_world() {
    let mut world = BugWorld::new(WorldConfig::default()).unwrap();
    let mut learner = Learner::new(
        world.state_dim(),
        world.action_space(),
        LearnerConfig {
            capacity: 64,
            batch_size: 8,
            hidden_layers: vec![16, 16],
            features: FeatureSelection::Leading(3),
            max_grad_norm: Some(10.0),
            seed: Some(21),
            ..Default::default()
        },
    )
    .unwrap();

    let mut updates = 0;
    for _ in 0..3 {
        let report = run_episode(&mut world, &mut learner, true, 25).unwrap();
        assert!(report.steps <= 25);
        updates += report.updates;
        if let Some(loss) = report.mean_loss {
            assert!(loss.is_finite());
        }
    }
    assert_eq!(updates, learner.updates());
    assert!(learner.updates() > 0);
    assert_eq!(
        learner.target_parameters().unwrap(),
        learner.online_parameters().unwrap()
    );
}
