// Integration tests for booster targets and counter bookkeeping
//
// Validates that placement stops at the target, that consuming a booster
// frees capacity again, and that external target changes take effect.

use concurrent_board::config::{Config, TargetSpec};
use concurrent_board::grid::{BoosterTargets, Grid};
use concurrent_board::player::{Player, PlayerTiming, StepResult};
use concurrent_board::types::{AgentId, Booster, BoosterKind, Position};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Test: coin target 2 on a 3x3 board
/// Two placements succeed, the third is refused; after a player picks one
/// up the next placement succeeds again
#[test]
fn test_consumption_frees_capacity() {
    let grid = Grid::new(3, 3, BoosterTargets { coin: 2, heal: 0, poison: 0 });
    let mut rng = StdRng::seed_from_u64(21);

    assert!(grid.place_booster_at(Position::new(1, 1), Booster::Coin(2)));
    assert!(grid.place_booster(Booster::Coin(5), &mut rng));
    assert!(!grid.place_booster(Booster::Coin(1), &mut rng));
    assert_eq!(grid.booster_count(BoosterKind::Coin), 2);

    let player = Player::new(AgentId(1), "Ana", 3, PlayerTiming::instant());
    let start = if grid.cell_content(Position::new(0, 1)).is_none() {
        Position::new(0, 1)
    } else {
        Position::new(2, 1)
    };
    assert!(grid.place_agent_at(start, &player));
    assert_eq!(
        player.take_step(&grid, Position::new(1, 1)),
        StepResult::Moved { consumed: Booster::Coin(2) }
    );
    assert_eq!(player.coins(), 2);
    assert_eq!(grid.booster_count(BoosterKind::Coin), 1);

    assert!(grid.place_booster(Booster::Coin(1), &mut rng));
    assert_eq!(grid.census(), grid.counters());
}

/// Test: fraction targets resolve to at least one booster
#[test]
fn test_fraction_targets_resolve_with_floor_of_one() {
    assert_eq!(TargetSpec::Fraction(0.10).resolve(100), 10);
    assert_eq!(TargetSpec::Fraction(0.10).resolve(9), 1);
    assert_eq!(TargetSpec::Count(8).resolve(100), 8);

    let config = Config::default_hardcoded();
    let grid = Grid::from_config(&config);
    assert_eq!(grid.target(BoosterKind::Coin), 10);
    assert_eq!(grid.target(BoosterKind::Heal), 8);
    assert_eq!(grid.target(BoosterKind::Poison), 10);
}

/// Test: lowering a target blocks placement but leaves the surplus in place
#[test]
fn test_set_target_applies_to_later_placements() {
    let grid = Grid::new(4, 4, BoosterTargets { coin: 0, heal: 3, poison: 0 });
    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..3 {
        assert!(grid.place_booster(Booster::Heal, &mut rng));
    }

    grid.set_target(BoosterKind::Heal, 1);
    assert!(!grid.place_booster(Booster::Heal, &mut rng));
    assert_eq!(grid.census().heal, 3);

    grid.set_target(BoosterKind::Heal, 4);
    assert!(grid.place_booster(Booster::Heal, &mut rng));
    assert_eq!(grid.booster_count(BoosterKind::Heal), 4);
}

/// Test: a board whose free cells are all covered refuses further boosters
#[test]
fn test_full_board_rejects_placement() {
    let grid = Grid::new(1, 2, BoosterTargets { coin: 5, heal: 0, poison: 0 });
    let player = Player::new(AgentId(1), "Ana", 3, PlayerTiming::instant());
    assert!(grid.place_agent_at(Position::new(0, 0), &player));
    assert!(grid.place_booster_at(Position::new(0, 1), Booster::Coin(1)));

    let mut rng = StdRng::seed_from_u64(6);
    assert!(!grid.place_booster(Booster::Coin(1), &mut rng));
    assert_eq!(grid.booster_count(BoosterKind::Coin), 1);
}

#[test]
#[should_panic(expected = "empty booster")]
fn test_placing_nothing_is_a_contract_violation() {
    let grid = Grid::new(2, 2, BoosterTargets { coin: 1, heal: 1, poison: 1 });
    let mut rng = StdRng::seed_from_u64(1);
    grid.place_booster(Booster::None, &mut rng);
}
