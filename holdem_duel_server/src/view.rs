//! 为每位观看者生成各自的牌局视图，隐藏他不该看到的牌

use holdem_duel_core::{Card, DealtCard, GameSession, GameView, PlayerId, PlayerState, PlayerView};

/// 自己的底牌总是可见；对手的底牌和公共牌只有翻开后才可见
pub fn for_viewer<F>(session: &GameSession, viewer: PlayerId, nickname: F) -> GameView
where
    F: Fn(PlayerId) -> String,
{
    let current_player_id = session.current_player_id();
    let legal_actions = if current_player_id == Some(viewer) { session.legal_actions() } else { Vec::new() };

    GameView {
        session_id: session.id,
        status: session.status,
        round: session.round,
        pot: session.pot,
        community_cards: session.community_cards.iter().map(|c| visible(c, false)).collect(),
        players: session.players.iter().map(|p| player_view(p, viewer, &nickname)).collect(),
        dealer_id: session.dealer_id(),
        current_player_id,
        winner_id: session.winner_id,
        winning_hand: session.winning_hand.clone(),
        results: session.results.clone(),
        legal_actions,
    }
}

fn player_view<F>(player: &PlayerState, viewer: PlayerId, nickname: &F) -> PlayerView
where
    F: Fn(PlayerId) -> String,
{
    let own = player.id == viewer;
    PlayerView {
        id: player.id,
        nickname: nickname(player.id),
        chips: player.chips,
        current_bet: player.current_bet,
        folded: player.folded,
        connected: player.connected,
        last_action: player.last_action,
        hand: player.hand.iter().map(|c| visible(c, own)).collect(),
    }
}

fn visible(card: &DealtCard, owner: bool) -> Option<Card> {
    (owner || card.revealed).then_some(card.card)
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdem_duel_core::{ActionOption, PlayerAction, Seat, create_session};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use uuid::Uuid;

    fn setup() -> (GameSession, PlayerId, PlayerId) {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let session = create_session(
            Uuid::new_v4(),
            Seat { id: a, chips: 1000 },
            Seat { id: b, chips: 1000 },
            &mut StdRng::seed_from_u64(8),
        )
        .unwrap();
        (session, a, b)
    }

    fn name(_: PlayerId) -> String {
        "玩家".to_string()
    }

    #[test]
    fn test_hides_opponent_hand_and_board() {
        let (session, a, b) = setup();
        let view = for_viewer(&session, a, name);

        assert!(view.player(a).unwrap().hand.iter().all(Option::is_some));
        assert!(view.player(b).unwrap().hand.iter().all(Option::is_none));
        assert_eq!(view.community_cards.len(), 5);
        assert!(view.community_cards.iter().all(Option::is_none));
        // 不是 A 的回合
        assert!(view.legal_actions.is_empty());

        let view = for_viewer(&session, b, name);
        assert_eq!(view.legal_actions, session.legal_actions());
        assert!(view.legal_actions.contains(&ActionOption::Check));
    }

    #[test]
    fn test_flop_is_visible_to_both() {
        let (session, a, b) = setup();
        let session = session.apply_action(b, PlayerAction::Check).unwrap();
        let session = session.apply_action(a, PlayerAction::Call).unwrap();

        for viewer in [a, b] {
            let view = for_viewer(&session, viewer, name);
            assert_eq!(view.community_cards.iter().filter(|c| c.is_some()).count(), 3);
        }
    }

    #[test]
    fn test_fold_out_keeps_hands_hidden() {
        let (session, a, b) = setup();
        let session = session.apply_action(b, PlayerAction::Fold).unwrap();
        let view = for_viewer(&session, a, name);
        assert!(view.player(b).unwrap().hand.iter().all(Option::is_none));
        assert_eq!(view.winner_id, Some(a));
    }

    #[test]
    fn test_outsider_sees_nothing_private() {
        let (session, ..) = setup();
        let view = for_viewer(&session, Uuid::new_v4(), name);
        assert!(view.players.iter().flat_map(|p| &p.hand).all(Option::is_none));
        assert_eq!(view.players[0].nickname, "玩家");
    }
}
