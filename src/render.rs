// Console rendering of a board snapshot

use std::collections::HashMap;

use crate::types::{AgentId, DisplayToken};

/// Renders one line per row, tokens separated by spaces.
///
/// `.` empty, `$` coin, `+` heal, `x` trap (only when `reveal_traps`),
/// players by their label from `labels` (`?` when unknown).
pub fn render_board(
    snapshot: &[Vec<DisplayToken>],
    labels: &HashMap<AgentId, char>,
    reveal_traps: bool,
) -> String {
    let mut out = String::with_capacity(snapshot.len() * (snapshot.first().map_or(0, Vec::len) * 2 + 1));

    for row in snapshot {
        let line: Vec<String> = row
            .iter()
            .map(|token| {
                match token {
                    DisplayToken::Empty => '.',
                    DisplayToken::Coin(_) => '$',
                    DisplayToken::Heal => '+',
                    DisplayToken::Trap if reveal_traps => 'x',
                    DisplayToken::Trap => '.',
                    DisplayToken::Player(id) => labels.get(id).copied().unwrap_or('?'),
                }
                .to_string()
            })
            .collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traps_hidden_unless_revealed() {
        let snapshot = vec![vec![
            DisplayToken::Player(AgentId(1)),
            DisplayToken::Trap,
            DisplayToken::Coin(5),
            DisplayToken::Heal,
        ]];
        let labels = HashMap::from([(AgentId(1), 'A')]);

        assert_eq!(render_board(&snapshot, &labels, false), "A . $ +\n");
        assert_eq!(render_board(&snapshot, &labels, true), "A x $ +\n");
    }

    #[test]
    fn test_unknown_player_gets_placeholder() {
        let snapshot = vec![vec![DisplayToken::Player(AgentId(9))], vec![DisplayToken::Empty]];
        assert_eq!(render_board(&snapshot, &HashMap::new(), false), "?\n.\n");
    }
}
