use acs_core::{AcsConfig, Agent, Environment};
use acs_env::{Maze, MAZE4, MAZE_SMALL};

fn run(agent: &mut Agent, maze: &mut Maze, trials: usize) -> usize {
    let mut finished = 0;
    for _ in 0..trials {
        let report = agent.explore_trial(maze, 50).expect("explore trial");
        if report.finished {
            finished += 1;
        }
    }
    finished
}

#[test]
fn agent_builds_a_reliable_model_of_the_small_maze() {
    let mut maze = Maze::parse("small", MAZE_SMALL).expect("valid maze").with_seed(5);
    let mut agent = Agent::new(AcsConfig::default(), &maze, 17).expect("valid config");

    let finished = run(&mut agent, &mut maze, 200);
    assert!(finished > 0);

    let stats = agent.stats();
    assert!(stats.reliable > 0, "no reliable classifiers: {stats:?}");
    assert!(stats.macro_size <= stats.micro_size as usize);

    let test = agent.test_model(&mut maze);
    assert_eq!(test.total(), (maze.free_cells() * 8) as u64);
    assert!(test.knowledge() > 0.0);
}

#[test]
fn same_seeds_reproduce_the_same_population() {
    let build = || {
        let mut maze = Maze::parse("maze4", MAZE4).expect("valid maze").with_seed(1);
        let mut agent = Agent::new(AcsConfig::default(), &maze, 2).expect("valid config");
        run(&mut agent, &mut maze, 20);
        agent
            .population
            .iter()
            .map(|(_, cl)| cl.to_string())
            .collect::<Vec<_>>()
    };
    assert_eq!(build(), build());
}

#[test]
fn slippery_maze_with_enhanced_effects_keeps_distributions_normalized() {
    let mut maze = Maze::parse("small", MAZE_SMALL)
        .expect("valid maze")
        .with_seed(11)
        .with_slip(0.2)
        .expect("valid slip");
    let config = AcsConfig::default().with_pee(true);
    let mut agent = Agent::new(config, &maze, 23).expect("valid config");

    run(&mut agent, &mut maze, 150);

    assert!(!agent.population.is_empty());
    assert!(
        agent.population.iter().any(|(_, cl)| cl.effect.is_enhanced()),
        "slip produced no enhanced effect"
    );
    for (_, cl) in agent.population.iter() {
        assert_eq!(cl.condition.len(), maze.perception_length());
        assert_eq!(cl.effect.len(), maze.perception_length());
        assert!((0.0..=1.0).contains(&cl.q));
        for (_, attr) in cl.effect.slots().iter() {
            assert!((attr.total() - 1.0).abs() < 1e-9, "{cl}");
        }
    }
}

#[test]
fn population_limit_is_respected() {
    let mut maze = Maze::parse("maze4", MAZE4).expect("valid maze").with_seed(4);
    let config = AcsConfig {
        max_population: Some(40),
        ..AcsConfig::default()
    };
    let mut agent = Agent::new(config, &maze, 8).expect("valid config");

    for _ in 0..30 {
        agent.explore_trial(&mut maze, 50).expect("explore trial");
        assert!(agent.population.num_size() <= 40);
    }
}
