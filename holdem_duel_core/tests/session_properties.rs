//! 随机动作序列下的牌局不变量
//!
//! 每一步都从当前行动者的角度随机选一个动作，被拒绝的动作必须保持状态不变，
//! 被接受的动作必须保持筹码守恒和牌堆完整。

use holdem_duel_core::*;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;
use uuid::Uuid;

fn new_session(seed: u64, a_chips: u32, b_chips: u32) -> GameSession {
    create_session(
        Uuid::new_v4(),
        Seat { id: Uuid::new_v4(), chips: a_chips },
        Seat { id: Uuid::new_v4(), chips: b_chips },
        &mut StdRng::seed_from_u64(seed),
    )
    .unwrap()
}

fn to_action(kind: u8, amount: u32) -> PlayerAction {
    match kind % 4 {
        0 => PlayerAction::Fold,
        1 => PlayerAction::Check,
        2 => PlayerAction::Call,
        _ => PlayerAction::Raise(amount),
    }
}

/// 底牌 + 公共牌 + 剩余牌堆 = 52 张互不相同的牌
fn assert_deck_integrity(session: &GameSession) -> Result<(), TestCaseError> {
    let mut all: Vec<Card> = session.players.iter().flat_map(|p| p.hole_cards()).collect();
    all.extend(session.community_cards.iter().map(|c| c.card));
    all.extend_from_slice(session.deck().cards());

    let distinct: HashSet<Card> = all.iter().copied().collect();
    prop_assert_eq!(all.len(), DECK_SIZE);
    prop_assert_eq!(distinct.len(), DECK_SIZE);
    Ok(())
}

/// 按行动前的状态推算这个动作应该被接受还是以哪种错误被拒绝
fn expected_outcome(session: &GameSession, action: PlayerAction) -> Result<(), GameError> {
    let high = session.max_bet();
    let Some(player) = session.current_player_id().and_then(|id| session.player(id)) else {
        return Err(GameError::NotActiveGame);
    };
    match action {
        PlayerAction::Fold => Ok(()),
        PlayerAction::Check if player.current_bet < high => Err(GameError::MustCallOrRaise),
        PlayerAction::Check => Ok(()),
        PlayerAction::Call if player.current_bet == high => Err(GameError::NothingToCall),
        PlayerAction::Call => Ok(()),
        PlayerAction::Raise(total) if total < minimum_raise(high) => {
            Err(GameError::RaiseTooSmall { minimum: minimum_raise(high) })
        }
        PlayerAction::Raise(total) if total - player.current_bet > player.chips => {
            Err(GameError::InsufficientChips)
        }
        PlayerAction::Raise(_) => Ok(()),
    }
}

fn actions_strategy() -> impl Strategy<Value = Vec<(u8, u32)>> {
    prop::collection::vec((0u8..4, 0u32..600), 0..40)
}

proptest! {
    /// 任意合法动作序列之后筹码总数不变
    #[test]
    fn test_chip_conservation(
        seed in any::<u64>(),
        a_chips in 1u32..500,
        b_chips in 1u32..500,
        actions in actions_strategy(),
    ) {
        let mut session = new_session(seed, a_chips, b_chips);
        let total = a_chips + b_chips;
        prop_assert_eq!(session.chips_in_play(), total);

        for (kind, amount) in actions {
            let Some(actor) = session.current_player_id() else { break };
            match session.apply_action(actor, to_action(kind, amount)) {
                Ok(next) => session = next,
                Err(_) => continue,
            }
            prop_assert_eq!(session.chips_in_play(), total);
        }

        if session.status == SessionStatus::Completed {
            prop_assert_eq!(session.pot, 0);
            prop_assert_eq!(session.players.iter().map(|p| p.chips).sum::<u32>(), total);
            prop_assert!(session.players.iter().all(|p| p.current_bet == 0));
        }
    }

    /// 牌堆完整，公共牌翻开数量与阶段一致
    #[test]
    fn test_deck_integrity_and_reveals(
        seed in any::<u64>(),
        actions in actions_strategy(),
    ) {
        let mut session = new_session(seed, 1000, 1000);
        assert_deck_integrity(&session)?;

        for (kind, amount) in actions {
            let Some(actor) = session.current_player_id() else { break };
            if let Ok(next) = session.apply_action(actor, to_action(kind, amount)) {
                session = next;
            }
            assert_deck_integrity(&session)?;
            if session.status == SessionStatus::Active {
                prop_assert_eq!(session.revealed_community_cards().len(), session.round.revealed_cards());
            }
        }
    }

    /// 每个动作按规则被接受或以对应的错误被拒绝，被拒绝的动作不改变任何状态
    #[test]
    fn test_rejected_actions_leave_state_unchanged(
        seed in any::<u64>(),
        actions in actions_strategy(),
    ) {
        let mut session = new_session(seed, 300, 300);
        for (kind, amount) in actions {
            let Some(actor) = session.current_player_id() else { break };
            let action = to_action(kind, amount);
            let before = session.clone();

            // 不是行动者的一方无论做什么都被拒绝
            let bystander = session.opponent_of(actor).map(|p| p.id);
            if let Some(bystander) = bystander {
                prop_assert_eq!(session.apply_action(bystander, action), Err(GameError::OutOfTurn));
            }

            let expected = expected_outcome(&session, action);
            match session.apply_action(actor, action) {
                Ok(next) => {
                    prop_assert_eq!(expected, Ok(()));
                    prop_assert_eq!(next.history.len(), before.history.len() + 1);
                    session = next;
                }
                Err(e) => {
                    prop_assert_eq!(expected, Err(e));
                    prop_assert_eq!(&session, &before);
                }
            }
        }

        if session.status == SessionStatus::Completed {
            let any = session.players[0].id;
            prop_assert_eq!(session.apply_action(any, PlayerAction::Fold), Err(GameError::NotActiveGame));
        }
    }

    /// 同样的牌和动作记录总能重放出同样的结果
    #[test]
    fn test_replay_is_deterministic(
        seed in any::<u64>(),
        actions in actions_strategy(),
    ) {
        let id = Uuid::new_v4();
        let seats = [Seat { id: Uuid::new_v4(), chips: 400 }, Seat { id: Uuid::new_v4(), chips: 250 }];
        let mut deck = Deck::new();
        deck.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut session = deal_session(id, seats, 1, deck.clone()).unwrap();
        for (kind, amount) in actions {
            let Some(actor) = session.current_player_id() else { break };
            if let Ok(next) = session.apply_action(actor, to_action(kind, amount)) {
                session = next;
            }
        }

        let replayed = replay(id, seats, 1, deck, &session.history).unwrap();
        prop_assert_eq!(replayed, session);
    }
}
