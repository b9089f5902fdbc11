//! Move generation checked against the `chess` crate.

use std::str::FromStr;

use board_game_server::game::chess::Position;
use board_game_server::game::{perft, Rules};
use chess::MoveGen;
use proptest::prelude::*;

const POSITIONS: [&str; 6] = [
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
];

fn oracle_perft(board: &chess::Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = MoveGen::new_legal(board);
    if depth == 1 {
        return moves.len() as u64;
    }
    moves.map(|mv| oracle_perft(&board.make_move_new(mv), depth - 1)).sum()
}

fn uci(position: &mut Position) -> Vec<String> {
    let mut moves: Vec<String> = position
        .legal_moves()
        .iter()
        .map(|mv| {
            let s = Position::summarize(mv);
            format!(
                "{}{}{}",
                s.from.unwrap_or_default(),
                s.to,
                s.promotion.unwrap_or_default().to_ascii_lowercase()
            )
        })
        .collect();
    moves.sort();
    moves
}

fn oracle_uci(board: &chess::Board) -> Vec<String> {
    let mut moves: Vec<String> = MoveGen::new_legal(board).map(|mv| mv.to_string()).collect();
    moves.sort();
    moves
}

#[test]
fn known_node_counts() {
    let expected = [8902, 97862, 43238, 9467, 62379, 89890];
    let depths = [3, 3, 4, 3, 3, 3];
    for ((fen, nodes), depth) in POSITIONS.iter().zip(expected).zip(depths) {
        let mut position = Position::from_fen(fen).unwrap();
        assert_eq!(perft(&mut position, depth), nodes, "{}", fen);
    }
}

#[test]
fn node_counts_match_oracle() {
    for fen in POSITIONS {
        let mut position = Position::from_fen(fen).unwrap();
        let board = chess::Board::from_str(fen).unwrap();
        for depth in 1..=2 {
            assert_eq!(perft(&mut position, depth), oracle_perft(&board, depth), "{} depth {}", fen, depth);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_games_agree_with_oracle(start in 0..POSITIONS.len(), choices in proptest::collection::vec(any::<usize>(), 0..80)) {
        let mut position = Position::from_fen(POSITIONS[start]).unwrap();
        let mut board = chess::Board::from_str(POSITIONS[start]).unwrap();
        for choice in choices {
            let ours = uci(&mut position);
            prop_assert_eq!(&ours, &oracle_uci(&board), "{}", position.to_fen());
            if ours.is_empty() {
                break;
            }
            let pick = &ours[choice % ours.len()];
            let mv = position
                .legal_moves()
                .into_iter()
                .find(|mv| {
                    let s = Position::summarize(mv);
                    pick.starts_with(&format!("{}{}", s.from.clone().unwrap_or_default(), s.to))
                        && s.promotion.as_deref().map_or(pick.len() == 4, |p| pick.ends_with(&p.to_ascii_lowercase()))
                })
                .unwrap();
            position.apply(&mv);
            let theirs = MoveGen::new_legal(&board).find(|m| m.to_string() == *pick).unwrap();
            board = board.make_move_new(theirs);

            let ours_fen = position.to_fen();
            let theirs_fen = board.to_string();
            let ours_fields: Vec<&str> = ours_fen.split(' ').take(3).collect();
            let theirs_fields: Vec<&str> = theirs_fen.split(' ').take(3).collect();
            prop_assert_eq!(ours_fields, theirs_fields);
        }
    }
}
