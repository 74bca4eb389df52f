use std::sync::Arc;

use dashmap::DashMap;
use holdem_duel_core::{GameError, GameSession, PlayerAction, PlayerId, Seat, SessionId, SessionStatus, create_session};
use parking_lot::Mutex;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServerError {
    #[error("牌局 {0} 不存在")]
    SessionNotFound(SessionId),

    #[error("你不在任何牌局中")]
    NotInSession,

    #[error("请先加入大厅")]
    NotJoined,

    #[error("你已经在牌局中了")]
    AlreadyJoined,

    #[error("昵称不能为空")]
    EmptyNickname,

    #[error("昵称 {0} 已经在线")]
    NicknameInUse(String),

    #[error("对手已经离开")]
    OpponentGone,

    #[error(transparent)]
    Game(#[from] GameError),
}

/// 按牌局 ID 管理所有进行中的牌局。
///
/// 每个牌局有自己的锁，锁只在一次状态转移期间持有，
/// 不同牌局之间互不影响。
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Mutex<GameSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, session: GameSession) {
        self.sessions.insert(session.id, Arc::new(Mutex::new(session)));
    }

    /// 开局并登记，`player_a` 是庄家
    pub fn create_session<R: Rng + ?Sized>(
        &self,
        session_id: SessionId,
        player_a: Seat,
        player_b: Seat,
        rng: &mut R,
    ) -> ServerResult<GameSession> {
        let session = create_session(session_id, player_a, player_b, rng)?;
        self.insert(session.clone());
        Ok(session)
    }

    /// 对指定牌局执行动作，成功后保存并返回新状态
    pub fn apply_action(&self, session_id: SessionId, player_id: PlayerId, action: PlayerAction) -> ServerResult<GameSession> {
        self.update(session_id, |session| session.apply_action(player_id, action))
    }

    pub fn get_state(&self, session_id: SessionId) -> ServerResult<GameSession> {
        let entry = self.entry(session_id)?;
        let session = entry.lock().clone();
        Ok(session)
    }

    pub fn set_connected(&self, session_id: SessionId, player_id: PlayerId, connected: bool) -> ServerResult<GameSession> {
        self.update(session_id, |session| session.set_connected(player_id, connected))
    }

    /// 超时弃牌。
    ///
    /// 只有当该玩家仍然是行动者，并且从计时开始后没有任何新动作
    /// (`moves` 是计时开始时的动作记录长度) 时才会弃牌，
    /// 否则说明玩家已经行动过，返回 `None`。
    pub fn fold_if_stalled(&self, session_id: SessionId, player_id: PlayerId, moves: usize) -> ServerResult<Option<GameSession>> {
        let entry = self.entry(session_id)?;
        let mut session = entry.lock();

        if session.current_player_id() != Some(player_id) || session.history.len() != moves {
            return Ok(None);
        }
        let next = session.apply_action(player_id, PlayerAction::Fold)?;
        *session = next.clone();
        Ok(Some(next))
    }

    /// 用已经结束的牌局开一局新的，旧牌局随之移除。
    ///
    /// 两名玩家可能同时请求再来一局，只有成功移除旧牌局的那一方
    /// 会登记新牌局，另一方得到 `SessionNotFound`。
    pub fn rematch<R: Rng + ?Sized>(&self, session_id: SessionId, rng: &mut R) -> ServerResult<GameSession> {
        let next = {
            let entry = self.entry(session_id)?;
            let session = entry.lock();
            session.rematch(Uuid::new_v4(), rng)?
        };
        if self.sessions.remove(&session_id).is_none() {
            return Err(ServerError::SessionNotFound(session_id));
        }
        self.insert(next.clone());
        info!("牌局 {} 再来一局: {}", session_id, next.id);
        Ok(next)
    }

    pub fn remove(&self, session_id: SessionId) -> Option<GameSession> {
        self.sessions.remove(&session_id).map(|(_, session)| session.lock().clone())
    }

    pub fn is_active(&self, session_id: SessionId) -> bool {
        self.get_state(session_id).is_ok_and(|s| s.status == SessionStatus::Active)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// 在牌局锁内执行一次状态转移
    fn update<F>(&self, session_id: SessionId, transition: F) -> ServerResult<GameSession>
    where
        F: FnOnce(&GameSession) -> Result<GameSession, GameError>,
    {
        let entry = self.entry(session_id)?;
        let mut session = entry.lock();
        let next = transition(&session)?;
        *session = next.clone();
        debug!("牌局 {} 已更新，当前阶段 {:?}", session_id, next.round);
        Ok(next)
    }

    // 先把 Arc 拿出来再加锁，避免持有 DashMap 分片锁时等待牌局锁
    fn entry(&self, session_id: SessionId) -> ServerResult<Arc<Mutex<GameSession>>> {
        self.sessions
            .get(&session_id)
            .map(|r| r.clone())
            .ok_or(ServerError::SessionNotFound(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn setup() -> (SessionRegistry, GameSession, PlayerId, PlayerId) {
        let registry = SessionRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let session = registry
            .create_session(Uuid::new_v4(), Seat { id: a, chips: 1000 }, Seat { id: b, chips: 1000 }, &mut StdRng::seed_from_u64(1))
            .unwrap();
        (registry, session, a, b)
    }

    #[test]
    fn test_apply_action_updates_stored_state() {
        let (registry, session, a, b) = setup();
        let next = registry.apply_action(session.id, b, PlayerAction::Check).unwrap();
        assert_eq!(next.current_player_id(), Some(a));
        assert_eq!(registry.get_state(session.id).unwrap(), next);
    }

    #[test]
    fn test_rejected_action_keeps_stored_state() {
        let (registry, session, a, _) = setup();
        let err = registry.apply_action(session.id, a, PlayerAction::Check).unwrap_err();
        assert_eq!(err, ServerError::Game(GameError::OutOfTurn));
        assert_eq!(registry.get_state(session.id).unwrap(), session);
    }

    #[test]
    fn test_unknown_session() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        assert_eq!(registry.get_state(id), Err(ServerError::SessionNotFound(id)));
        assert_eq!(
            registry.apply_action(id, Uuid::new_v4(), PlayerAction::Fold),
            Err(ServerError::SessionNotFound(id))
        );
    }

    #[test]
    fn test_fold_if_stalled_only_when_nothing_happened() {
        let (registry, session, a, b) = setup();
        let moves = session.history.len();

        // B 已经行动过，旧的计时失效
        registry.apply_action(session.id, b, PlayerAction::Check).unwrap();
        assert_eq!(registry.fold_if_stalled(session.id, b, moves), Ok(None));

        let folded = registry.fold_if_stalled(session.id, a, moves + 1).unwrap().unwrap();
        assert_eq!(folded.status, SessionStatus::Completed);
        assert_eq!(folded.winner_id, Some(b));
        assert!(!registry.is_active(session.id));
    }

    #[test]
    fn test_rematch_replaces_session() {
        let (registry, session, _, b) = setup();
        assert!(matches!(
            registry.rematch(session.id, &mut StdRng::seed_from_u64(2)),
            Err(ServerError::Game(GameError::SessionInProgress))
        ));

        registry.apply_action(session.id, b, PlayerAction::Fold).unwrap();
        let next = registry.rematch(session.id, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get_state(session.id).is_err());
        assert!(registry.is_active(next.id));
        assert_eq!(next.dealer_id(), b);

        // 旧牌局已经被替换，再次请求不会多开一局
        assert_eq!(
            registry.rematch(session.id, &mut StdRng::seed_from_u64(3)),
            Err(ServerError::SessionNotFound(session.id))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_rematch_creates_one_session() {
        let (registry, session, _, b) = setup();
        registry.apply_action(session.id, b, PlayerAction::Fold).unwrap();

        let results: Vec<ServerResult<GameSession>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|seed| {
                    let registry = &registry;
                    scope.spawn(move || registry.rematch(session.id, &mut StdRng::seed_from_u64(seed)))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let started: Vec<&GameSession> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(started.len(), 1);
        assert!(results.iter().any(|r| r == &Err(ServerError::SessionNotFound(session.id))));
        assert_eq!(registry.len(), 1);
        assert!(registry.is_active(started[0].id));
    }

    #[test]
    fn test_set_connected() {
        let (registry, session, a, _) = setup();
        let next = registry.set_connected(session.id, a, false).unwrap();
        assert!(!next.player(a).unwrap().connected);
    }
}
