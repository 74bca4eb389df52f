use crate::card::*;
use crate::error::{GameError, GameResult};
use crate::evaluator::*;
use crate::state::*;
use rand::Rng;
use tracing::{debug, info};

/// 加注后的总额至少是当前最高下注的两倍 (固定规则)；
/// 没有人下注时任何正数都可以。
pub fn minimum_raise(max_bet: u32) -> u32 {
    max_bet.saturating_mul(2).max(1)
}

// --- 核心游戏流程函数 ---

/// 开始一局新的单挑牌局
///
/// - 用调用方提供的随机源洗一副新牌。
/// - `player_a` 是庄家，先拿牌并下小盲，`player_b` 下大盲。
/// - 返回已经发好牌、下好盲注的 active 牌局，轮到大盲先行动。
pub fn create_session<R: Rng + ?Sized>(
    id: SessionId,
    player_a: Seat,
    player_b: Seat,
    rng: &mut R,
) -> GameResult<GameSession> {
    let mut deck = Deck::new();
    deck.shuffle(rng);
    deal_session(id, [player_a, player_b], 0, deck)
}

/// 用一副给定顺序的牌开局，复盘和测试用它来得到确定的牌面
///
/// 发牌顺序：庄家两张底牌，对手两张底牌，然后五张背面朝上的公共牌。
pub fn deal_session(
    id: SessionId,
    seats: [Seat; 2],
    dealer_index: usize,
    mut deck: Deck,
) -> GameResult<GameSession> {
    if seats[0].id == seats[1].id {
        return Err(GameError::DuplicatePlayer);
    }
    if seats.iter().any(|s| s.chips == 0) {
        return Err(GameError::InsufficientChips);
    }
    // 桌上总筹码要能用 u32 表示，否则奖池会溢出
    if seats[0].chips.checked_add(seats[1].chips).is_none() {
        return Err(GameError::StakeTooLarge { max: u32::MAX });
    }

    let dealer_index = dealer_index % 2;
    let big_blind_index = 1 - dealer_index;
    let mut players = seats.map(PlayerState::seated);

    // 1. 发底牌 (只有本人可见，所以 revealed = false)
    for idx in [dealer_index, big_blind_index] {
        players[idx].hand = vec![deck.deal_card(false)?, deck.deal_card(false)?];
    }

    // 2. 五张公共牌先全部发好，背面朝上
    let community_cards = (0..COMMUNITY_CARDS)
        .map(|_| deck.deal_card(false))
        .collect::<GameResult<Vec<_>>>()?;

    // 3. 盲注，筹码不够时全下
    post_blind(&mut players[dealer_index], SMALL_BLIND);
    post_blind(&mut players[big_blind_index], BIG_BLIND);

    let mut session = GameSession {
        id,
        status: SessionStatus::Active,
        round: Round::PreFlop,
        pot: 0,
        community_cards,
        players,
        dealer_index,
        current_player_index: big_blind_index,
        winner_id: None,
        winning_hand: None,
        results: Vec::new(),
        history: Vec::new(),
        deck,
    };

    // 已经全下的大盲没有动作可做
    if session.players[big_blind_index].chips == 0 {
        session.current_player_index = dealer_index;
    }
    // 两个人都被盲注打光时直接摊牌
    if session.is_round_complete() {
        session.settle_round();
    }

    info!(
        session_id = %id,
        dealer = %session.players[dealer_index].id,
        big_blind = %session.players[big_blind_index].id,
        "牌局开始"
    );
    Ok(session)
}

/// 按顺序重放动作记录，得到与原局完全相同的状态
pub fn replay(
    id: SessionId,
    seats: [Seat; 2],
    dealer_index: usize,
    deck: Deck,
    history: &[ActionRecord],
) -> GameResult<GameSession> {
    history.iter().try_fold(deal_session(id, seats, dealer_index, deck)?, |session, record| {
        session.apply_action(record.player_id, record.action)
    })
}

impl PendingSession {
    /// 第二位玩家入座，沿用等待中的牌局 ID 开局，先入座的玩家当庄家
    pub fn start<R: Rng + ?Sized>(&self, guest: Seat, rng: &mut R) -> GameResult<GameSession> {
        create_session(self.id, self.host, guest, rng)
    }
}

fn post_blind(player: &mut PlayerState, blind: u32) {
    let amount = blind.min(player.chips);
    player.chips -= amount;
    player.current_bet = amount;
}

impl GameSession {
    /// 处理单个玩家的动作
    ///
    /// 这是牌局唯一的修改入口。旧状态不会被改动：
    /// 动作合法时返回新的状态，否则返回错误。
    /// - 扣除筹码，记入本轮下注。
    /// - 弃牌时对手立即赢得奖池。
    /// - 本轮下注结束时收进奖池并推进到下一阶段 (Flop -> Turn ...)。
    pub fn apply_action(&self, player_id: PlayerId, action: PlayerAction) -> GameResult<GameSession> {
        if self.status != SessionStatus::Active {
            return Err(GameError::NotActiveGame);
        }
        let seat = self.current_player_index;
        if self.players[seat].id != player_id {
            return Err(GameError::OutOfTurn);
        }

        let mut next = self.clone();
        next.place(seat, action)?;
        next.history.push(ActionRecord { player_id, action });
        debug!(session_id = %self.id, player_id = %player_id, %action, round = ?self.round, "动作已接受");

        if action == PlayerAction::Fold {
            next.finish_fold_out();
        } else {
            next.advance_to_next_player(seat);
            if next.is_round_complete() {
                next.settle_round();
            }
        }

        debug_assert_eq!(next.chips_in_play(), self.chips_in_play());
        Ok(next)
    }

    /// 更新玩家的连接状态，断线本身不影响牌局，超时弃牌由上层处理
    pub fn set_connected(&self, player_id: PlayerId, connected: bool) -> GameResult<GameSession> {
        if self.status != SessionStatus::Active {
            return Err(GameError::NotActiveGame);
        }
        let seat = self.seat_of(player_id).ok_or(GameError::UnknownPlayer(player_id))?;

        let mut next = self.clone();
        next.players[seat].connected = connected;
        Ok(next)
    }

    /// 同样两位玩家再来一局：带着本局结束时的筹码，庄家换到另一个座位
    pub fn rematch<R: Rng + ?Sized>(&self, id: SessionId, rng: &mut R) -> GameResult<GameSession> {
        if self.status != SessionStatus::Completed {
            return Err(GameError::SessionInProgress);
        }
        let seats = self.players.each_ref().map(|p| Seat { id: p.id, chips: p.chips });
        let mut deck = Deck::new();
        deck.shuffle(rng);
        deal_session(id, seats, 1 - self.dealer_index, deck)
    }

    // --- 辅助逻辑函数 ---

    /// 校验并执行动作本身，不处理轮次推进
    fn place(&mut self, seat: usize, action: PlayerAction) -> GameResult<()> {
        let high = self.max_bet();
        let player = &mut self.players[seat];

        match action {
            PlayerAction::Fold => {
                player.folded = true;
            }
            PlayerAction::Check => {
                if player.current_bet < high {
                    return Err(GameError::MustCallOrRaise);
                }
            }
            PlayerAction::Call => {
                let deficit = high - player.current_bet;
                if deficit == 0 {
                    return Err(GameError::NothingToCall);
                }
                // 筹码不够时全下跟注
                let amount = deficit.min(player.chips);
                player.chips -= amount;
                player.current_bet += amount;
            }
            PlayerAction::Raise(total) => {
                let minimum = minimum_raise(high);
                if total < minimum {
                    return Err(GameError::RaiseTooSmall { minimum });
                }
                let amount = total - player.current_bet;
                if amount > player.chips {
                    return Err(GameError::InsufficientChips);
                }
                player.chips -= amount;
                player.current_bet = total;
            }
        }

        player.last_action = Some(action);
        player.has_acted = true;
        Ok(())
    }

    /// 将行动权转移给对手；对手已经全下时行动权留在原地
    fn advance_to_next_player(&mut self, seat: usize) {
        let other = 1 - seat;
        let opponent = &self.players[other];
        if !opponent.folded && opponent.chips > 0 {
            self.current_player_index = other;
        }
    }

    /// 检查当前下注轮是否结束：
    /// 每个还有筹码的未弃牌玩家都已行动并且跟平了最高下注。
    /// 已经全下的玩家不需要再行动，即使没有跟平。
    fn is_round_complete(&self) -> bool {
        let high = self.max_bet();
        self.players
            .iter()
            .filter(|p| !p.folded)
            .all(|p| p.chips == 0 || (p.has_acted && p.current_bet == high))
    }

    /// 一轮下注结束：退回没人能跟的部分，收下注进奖池，然后翻牌或摊牌
    fn settle_round(&mut self) {
        self.return_uncalled_bet();
        self.collect_bets();
        self.players.iter_mut().for_each(|p| p.has_acted = false);

        // 有人全下时不会再有下注，直接发完公共牌
        if self.players.iter().any(PlayerState::is_all_in) {
            self.reveal_board(COMMUNITY_CARDS);
            self.showdown();
            return;
        }

        self.round = match self.round {
            Round::PreFlop => Round::Flop,
            Round::Flop => Round::Turn,
            Round::Turn => Round::River,
            Round::River | Round::Showdown => {
                self.showdown();
                return;
            }
        };
        self.reveal_board(self.round.revealed_cards());
        // 翻牌后总是庄家先行动
        self.current_player_index = self.dealer_index;
        debug!(session_id = %self.id, round = ?self.round, board = ?self.revealed_community_cards(), "进入新一轮");
    }

    /// 全下的玩家下注较少时，对手多出来的部分没有人跟，退回给对手
    fn return_uncalled_bet(&mut self) {
        let [a, b] = &mut self.players;
        let (high, low) = if a.current_bet >= b.current_bet { (a, b) } else { (b, a) };
        let excess = high.current_bet - low.current_bet;
        if excess > 0 {
            high.current_bet -= excess;
            high.chips += excess;
            debug!(session_id = %self.id, player_id = %high.id, excess, "退回未被跟注的筹码");
        }
    }

    fn collect_bets(&mut self) {
        for player in &mut self.players {
            self.pot += player.current_bet;
            player.current_bet = 0;
        }
    }

    /// 翻开前 `count` 张公共牌，已经翻开的不会再盖上
    fn reveal_board(&mut self, count: usize) {
        self.community_cards.iter_mut().take(count).for_each(DealtCard::reveal);
    }

    /// 只剩一位玩家：他拿走全部奖池，不再翻牌
    fn finish_fold_out(&mut self) {
        self.collect_bets();
        let Some(winner) = self.players.iter().find(|p| !p.folded).map(|p| p.id) else {
            return;
        };

        let payouts = self.award(&[winner]);
        self.winner_id = Some(winner);
        self.results = self
            .players
            .iter()
            .map(|p| ShowdownResult {
                player_id: p.id,
                hand_rank: None,
                cards: None,
                winnings: winnings_of(&payouts, p.id),
            })
            .collect();
        self.complete();
    }

    /// 处理摊牌逻辑
    ///
    /// - 亮出所有未弃牌玩家的底牌。
    /// - 评估每位玩家的最大牌型并比较。
    /// - 平局时平分奖池，多出来的一个筹码给非庄家。
    fn showdown(&mut self) {
        self.round = Round::Showdown;
        let board = self.revealed_community_cards();

        let mut hands = Vec::with_capacity(2);
        for player in self.players.iter_mut().filter(|p| !p.folded) {
            player.hand.iter_mut().for_each(DealtCard::reveal);
            let mut cards = player.hole_cards();
            cards.extend_from_slice(&board);
            hands.push((player.id, cards));
        }

        let payouts = match evaluate_winner(&hands) {
            Some(ShowdownOutcome::Winner(evaluation)) => {
                self.winner_id = Some(evaluation.player_id);
                self.winning_hand = Some(evaluation.rank.category().to_string());
                self.award(&[evaluation.player_id])
            }
            Some(ShowdownOutcome::Split(leaders)) => {
                self.winning_hand = leaders.first().map(|e| e.rank.category().to_string());
                let ids: Vec<PlayerId> = leaders.iter().map(|e| e.player_id).collect();
                self.award(&ids)
            }
            // 7 张牌总能评估，这里只是保证奖池不会被吞掉
            None => {
                let ids: Vec<PlayerId> = hands.iter().map(|(id, _)| *id).collect();
                self.award(&ids)
            }
        };

        self.results = self
            .players
            .iter()
            .map(|p| {
                let shown = !p.folded;
                let cards = match p.hand.as_slice() {
                    [c1, c2] if shown => Some((c1.card, c2.card)),
                    _ => None,
                };
                let hand_rank = if shown {
                    hands.iter().find(|(id, _)| *id == p.id).and_then(|(_, cards)| find_best_hand(cards))
                } else {
                    None
                };
                ShowdownResult { player_id: p.id, hand_rank, cards, winnings: winnings_of(&payouts, p.id) }
            })
            .collect();
        self.complete();
    }

    /// 将奖池分配给赢家，返回每位赢家拿到的筹码
    fn award(&mut self, winners: &[PlayerId]) -> Vec<(PlayerId, u32)> {
        if winners.is_empty() {
            return Vec::new();
        }

        // 非庄家排在前面，零头归他
        let order = [1 - self.dealer_index, self.dealer_index];
        let share = self.pot / winners.len() as u32;
        let mut remainder = self.pot % winners.len() as u32;

        let mut payouts = Vec::with_capacity(winners.len());
        for idx in order {
            let player = &mut self.players[idx];
            if !winners.contains(&player.id) {
                continue;
            }
            let amount = share + std::mem::take(&mut remainder);
            player.chips += amount;
            payouts.push((player.id, amount));
        }
        self.pot = 0;
        payouts
    }

    fn complete(&mut self) {
        self.status = SessionStatus::Completed;
        info!(
            session_id = %self.id,
            winner = ?self.winner_id,
            hand = ?self.winning_hand,
            "牌局结束"
        );
    }
}

fn winnings_of(payouts: &[(PlayerId, u32)], player_id: PlayerId) -> u32 {
    payouts.iter().find(|(id, _)| *id == player_id).map_or(0, |(_, amount)| *amount)
}

// --- 单元测试 ---
