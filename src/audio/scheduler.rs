use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{collections::VecDeque, future::Future, path::Path, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::{
    guard::AccessGuard,
    request::{AudioSource, PlaybackOutcome, PlaybackRequest, VoiceTarget},
    voice::{ChannelOccupancy, VoiceGateway},
};
use crate::error::{PlaybackError, VoiceStage};

/// Límites de tiempo para cada llamada al colaborador de voz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceTimeouts {
    pub connect: Duration,
    pub play: Duration,
    pub disconnect: Duration,
}

impl Default for VoiceTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            play: Duration::from_secs(600),
            disconnect: Duration::from_secs(10),
        }
    }
}

/// Cola de un servidor. `draining` indica que hay un worker activo.
#[derive(Debug, Default)]
struct GuildQueue {
    pending: VecDeque<PlaybackRequest>,
    draining: bool,
}

/// Serializa el uso de voz por servidor.
///
/// Cada guild tiene su propia cola FIFO y, como mucho, un worker que la
/// vacía. El worker se lanza al encolar en una guild ociosa y termina
/// cuando la cola queda vacía; ambas transiciones ocurren bajo el mismo
/// mutex que protege la cola. Guilds distintas no se bloquean entre sí.
///
/// Los bloqueos del [`AccessGuard`] se evalúan al despachar cada petición,
/// contra los ocupantes que el canal tiene en ese momento.
///
/// Una petición cuyo ticket ya se soltó se descarta al llegar al frente de
/// la cola. Si el solicitante se rinde mientras su audio suena, el audio
/// termina igualmente.
#[derive(Clone)]
pub struct PlaybackScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    queues: DashMap<GuildId, Arc<Mutex<GuildQueue>>>,
    guard: Arc<AccessGuard>,
    voice: Arc<dyn VoiceGateway>,
    occupancy: Arc<dyn ChannelOccupancy>,
    timeouts: VoiceTimeouts,
}

impl PlaybackScheduler {
    pub fn new(
        guard: Arc<AccessGuard>,
        voice: Arc<dyn VoiceGateway>,
        occupancy: Arc<dyn ChannelOccupancy>,
        timeouts: VoiceTimeouts,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                queues: DashMap::new(),
                guard,
                voice,
                occupancy,
                timeouts,
            }),
        }
    }

    pub fn guard(&self) -> &Arc<AccessGuard> {
        &self.inner.guard
    }

    /// Encola la petición y, si la guild estaba ociosa, lanza su worker.
    ///
    /// No espera a la reproducción; el resultado llega por el ticket.
    pub fn submit(&self, request: PlaybackRequest) {
        let guild_id = request.target.guild_id;
        let queue = self.queue_for(guild_id);

        let start_worker = {
            let mut q = queue.lock();
            q.pending.push_back(request);
            debug!(
                "➕ Petición encolada en guild {} ({} pendientes)",
                guild_id,
                q.pending.len()
            );
            !std::mem::replace(&mut q.draining, true)
        };

        if start_worker {
            debug!("▶️ Worker iniciado para guild {}", guild_id);
            tokio::spawn(self.clone().drain(guild_id, queue));
        }
    }

    /// Peticiones esperando turno (sin contar la que suena).
    #[cfg(test)]
    fn pending(&self, guild_id: GuildId) -> usize {
        self.inner
            .queues
            .get(&guild_id)
            .map(|queue| queue.lock().pending.len())
            .unwrap_or(0)
    }

    #[cfg(test)]
    fn is_draining(&self, guild_id: GuildId) -> bool {
        self.inner
            .queues
            .get(&guild_id)
            .map(|queue| queue.lock().draining)
            .unwrap_or(false)
    }

    fn queue_for(&self, guild_id: GuildId) -> Arc<Mutex<GuildQueue>> {
        self.inner.queues.entry(guild_id).or_default().clone()
    }

    async fn drain(self, guild_id: GuildId, queue: Arc<Mutex<GuildQueue>>) {
        while let Some(request) = next_or_idle(&queue) {
            self.dispatch(request).await;
        }
        debug!("⏹️ Cola vacía, worker terminado para guild {}", guild_id);
    }

    async fn dispatch(&self, request: PlaybackRequest) {
        let PlaybackRequest {
            source,
            target,
            completion,
        } = request;

        if completion.is_closed() {
            info!(
                "🗑️ Petición abandonada descartada en guild {}",
                target.guild_id
            );
        } else {
            let outcome = self.run(&source, target).await;
            match &outcome {
                Ok(()) => info!(
                    "✅ Reproducción completada: {} en guild {}",
                    source.path().display(),
                    target.guild_id
                ),
                Err(e) => warn!("❌ Petición fallida en guild {}: {}", target.guild_id, e),
            }

            if completion.send(outcome).is_err() {
                debug!("El solicitante ya no espera el resultado");
            }
        }

        if let AudioSource::Temporary(path) = &source {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(
                    "No se pudo borrar el audio temporal {}: {}",
                    path.display(),
                    e
                );
            }
        }
    }

    async fn run(&self, source: &AudioSource, target: VoiceTarget) -> PlaybackOutcome {
        let occupants = self
            .inner
            .occupancy
            .occupants(target.guild_id, target.channel_id);
        let blocking = self
            .inner
            .guard
            .blocking_users(target.guild_id, target.channel_id, &occupants);
        if !blocking.is_empty() {
            return Err(PlaybackError::Blocked { users: blocking });
        }

        let path = source.path();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(PlaybackError::SourceMissing {
                path: path.to_path_buf(),
            });
        }

        let played = self.stream(path, target).await;

        // La conexión se libera aunque la reproducción haya fallado
        let released = bounded(
            VoiceStage::Disconnect,
            self.inner.timeouts.disconnect,
            self.inner.voice.disconnect(target.guild_id),
        )
        .await;

        match (played, released) {
            (Err(e), released) => {
                if let Err(release_error) = released {
                    warn!("Error liberando la voz tras un fallo: {}", release_error);
                }
                Err(e)
            }
            (Ok(()), released) => released,
        }
    }

    async fn stream(&self, path: &Path, target: VoiceTarget) -> PlaybackOutcome {
        let voice = &self.inner.voice;
        let timeouts = self.inner.timeouts;

        bounded(VoiceStage::Connect, timeouts.connect, async {
            match voice.current_channel(target.guild_id).await {
                Some(current) if current == target.channel_id => Ok(()),
                Some(_) => voice.move_to(target).await,
                None => voice.connect(target).await,
            }
        })
        .await?;

        bounded(
            VoiceStage::Play,
            timeouts.play,
            voice.play(target.guild_id, path),
        )
        .await
    }
}

/// Saca la siguiente petición o marca la guild como ociosa, todo bajo el lock.
fn next_or_idle(queue: &Mutex<GuildQueue>) -> Option<PlaybackRequest> {
    let mut q = queue.lock();
    let next = q.pending.pop_front();
    if next.is_none() {
        q.draining = false;
    }
    next
}

async fn bounded<F>(stage: VoiceStage, limit: Duration, call: F) -> PlaybackOutcome
where
    F: Future<Output = anyhow::Result<()>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PlaybackError::PlaybackFailed {
            cause: format!("{e:#}"),
        }),
        Err(_) => Err(PlaybackError::Timeout { stage }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::voice::MockChannelOccupancy;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serenity::model::id::{ChannelId, UserId};
    use std::{
        collections::{HashMap, HashSet},
        path::PathBuf,
        sync::atomic::{AtomicUsize, Ordering},
    };
    use tokio::time::Instant;

    const G1: GuildId = GuildId::new(1);
    const G2: GuildId = GuildId::new(2);
    const C1: ChannelId = ChannelId::new(100);
    const USER: UserId = UserId::new(500);

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Connect(GuildId, ChannelId),
        Move(GuildId, ChannelId),
        Play(GuildId, PathBuf),
        Disconnect(GuildId),
    }

    /// Voz falsa que registra las llamadas.
    #[derive(Default)]
    struct FakeVoice {
        calls: Mutex<Vec<Call>>,
        connected: Mutex<HashMap<GuildId, ChannelId>>,
        play_delays: HashMap<GuildId, Duration>,
        hanging_connects: AtomicUsize,
        failing_plays: AtomicUsize,
        active_plays: AtomicUsize,
        max_active_plays: AtomicUsize,
    }

    impl FakeVoice {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl VoiceGateway for FakeVoice {
        async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
            self.connected.lock().get(&guild_id).copied()
        }

        async fn connect(&self, target: VoiceTarget) -> anyhow::Result<()> {
            self.calls
                .lock()
                .push(Call::Connect(target.guild_id, target.channel_id));
            let hang = self
                .hanging_connects
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if hang {
                std::future::pending::<()>().await;
            }
            self.connected.lock().insert(target.guild_id, target.channel_id);
            Ok(())
        }

        async fn move_to(&self, target: VoiceTarget) -> anyhow::Result<()> {
            self.calls
                .lock()
                .push(Call::Move(target.guild_id, target.channel_id));
            self.connected.lock().insert(target.guild_id, target.channel_id);
            Ok(())
        }

        async fn play(&self, guild_id: GuildId, source: &Path) -> anyhow::Result<()> {
            self.calls
                .lock()
                .push(Call::Play(guild_id, source.to_path_buf()));

            let active = self.active_plays.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active_plays.fetch_max(active, Ordering::SeqCst);
            if let Some(delay) = self.play_delays.get(&guild_id) {
                tokio::time::sleep(*delay).await;
            }
            self.active_plays.fetch_sub(1, Ordering::SeqCst);

            let fail = self
                .failing_plays
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if fail {
                return Err(anyhow!("decoder exploded"));
            }
            Ok(())
        }

        async fn disconnect(&self, guild_id: GuildId) -> anyhow::Result<()> {
            self.calls.lock().push(Call::Disconnect(guild_id));
            self.connected.lock().remove(&guild_id);
            Ok(())
        }
    }

    fn empty_channels() -> MockChannelOccupancy {
        let mut occupancy = MockChannelOccupancy::new();
        occupancy.expect_occupants().returning(|_, _| HashSet::new());
        occupancy
    }

    fn user_in_channel(user: UserId) -> MockChannelOccupancy {
        let mut occupancy = MockChannelOccupancy::new();
        occupancy
            .expect_occupants()
            .returning(move |_, _| HashSet::from([user]));
        occupancy
    }

    fn scheduler(
        voice: Arc<FakeVoice>,
        occupancy: MockChannelOccupancy,
        timeouts: VoiceTimeouts,
    ) -> PlaybackScheduler {
        PlaybackScheduler::new(
            Arc::new(AccessGuard::new()),
            voice,
            Arc::new(occupancy),
            timeouts,
        )
    }

    /// Crea un clip real en disco para que la comprobación de existencia pase.
    fn clip(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"ID3").expect("write clip");
        path
    }

    fn stored(path: &Path, guild_id: GuildId) -> (PlaybackRequest, crate::audio::PlaybackTicket) {
        PlaybackRequest::new(
            AudioSource::Stored(path.to_path_buf()),
            VoiceTarget::new(guild_id, C1),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_play_in_submission_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice::default());
        let scheduler = scheduler(voice.clone(), empty_channels(), VoiceTimeouts::default());

        let paths: Vec<PathBuf> = ["r1.mp3", "r2.mp3", "r3.mp3"]
            .iter()
            .map(|name| clip(&dir, name))
            .collect();
        let tickets: Vec<_> = paths
            .iter()
            .map(|path| {
                let (request, ticket) = stored(path, G1);
                scheduler.submit(request);
                ticket
            })
            .collect();

        for ticket in tickets {
            assert_eq!(ticket.wait().await, Ok(()));
        }

        let expected: Vec<Call> = paths
            .iter()
            .flat_map(|path| {
                [
                    Call::Connect(G1, C1),
                    Call::Play(G1, path.clone()),
                    Call::Disconnect(G1),
                ]
            })
            .collect();
        assert_eq!(voice.calls(), expected);
        assert!(!scheduler.is_draining(G1));
        assert_eq!(scheduler.pending(G1), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_guild_never_overlaps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice {
            play_delays: HashMap::from([(G1, Duration::from_millis(50))]),
            ..Default::default()
        });
        let scheduler = scheduler(voice.clone(), empty_channels(), VoiceTimeouts::default());
        let path = clip(&dir, "clip.mp3");

        let tickets: Vec<_> = (0..4)
            .map(|_| {
                let (request, ticket) = stored(&path, G1);
                scheduler.submit(request);
                ticket
            })
            .collect();
        assert!(scheduler.is_draining(G1));

        for ticket in tickets {
            assert_eq!(ticket.wait().await, Ok(()));
        }
        assert_eq!(voice.max_active_plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guilds_do_not_wait_for_each_other() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice {
            play_delays: HashMap::from([
                (G1, Duration::from_secs(60)),
                (G2, Duration::from_millis(10)),
            ]),
            ..Default::default()
        });
        let scheduler = scheduler(voice, empty_channels(), VoiceTimeouts::default());
        let path = clip(&dir, "clip.mp3");
        let start = Instant::now();

        let (slow, slow_ticket) = stored(&path, G1);
        let (fast, fast_ticket) = stored(&path, G2);
        scheduler.submit(slow);
        scheduler.submit(fast);

        assert_eq!(fast_ticket.wait().await, Ok(()));
        assert!(start.elapsed() < Duration::from_secs(60));
        assert!(scheduler.is_draining(G1));

        assert_eq!(slow_ticket.wait().await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_request_makes_no_voice_calls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice::default());
        let scheduler = scheduler(voice.clone(), user_in_channel(USER), VoiceTimeouts::default());
        scheduler
            .guard()
            .block(G1, C1, USER, Duration::from_secs(2 * 3600));

        let (request, ticket) = stored(&clip(&dir, "clip.mp3"), G1);
        scheduler.submit(request);

        assert_eq!(
            ticket.wait().await,
            Err(PlaybackError::Blocked { users: vec![USER] })
        );
        assert!(voice.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_is_checked_at_dispatch_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice {
            play_delays: HashMap::from([(G1, Duration::from_secs(5))]),
            ..Default::default()
        });
        let scheduler = scheduler(voice.clone(), user_in_channel(USER), VoiceTimeouts::default());
        let path = clip(&dir, "clip.mp3");

        let (first, first_ticket) = stored(&path, G1);
        let (second, second_ticket) = stored(&path, G1);
        scheduler.submit(first);
        scheduler.submit(second);

        // Bloquear mientras la primera suena afecta a la segunda
        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.guard().block(G1, C1, USER, Duration::from_secs(60));

        assert_eq!(first_ticket.wait().await, Ok(()));
        assert_eq!(
            second_ticket.wait().await,
            Err(PlaybackError::Blocked { users: vec![USER] })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unblock_while_queued_lets_request_play() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice {
            play_delays: HashMap::from([(G1, Duration::from_secs(5))]),
            ..Default::default()
        });
        let occupancy = {
            let mut mock = MockChannelOccupancy::new();
            let seen = AtomicUsize::new(0);
            // Primera petición: canal vacío; después el usuario está dentro
            mock.expect_occupants().returning(move |_, _| {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    HashSet::new()
                } else {
                    HashSet::from([USER])
                }
            });
            mock
        };
        let scheduler = scheduler(voice, occupancy, VoiceTimeouts::default());
        scheduler.guard().block(G1, C1, USER, Duration::from_secs(600));
        let path = clip(&dir, "clip.mp3");

        let (first, first_ticket) = stored(&path, G1);
        let (second, second_ticket) = stored(&path, G1);
        scheduler.submit(first);
        scheduler.submit(second);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(scheduler.guard().unblock(G1, C1, USER));

        assert_eq!(first_ticket.wait().await, Ok(()));
        assert_eq!(second_ticket.wait().await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_connect_times_out_and_queue_moves_on() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice {
            hanging_connects: AtomicUsize::new(1),
            ..Default::default()
        });
        let timeouts = VoiceTimeouts {
            connect: Duration::from_millis(30),
            ..Default::default()
        };
        let scheduler = scheduler(voice.clone(), empty_channels(), timeouts);
        let path = clip(&dir, "clip.mp3");
        let start = Instant::now();

        let (stuck, stuck_ticket) = stored(&path, G1);
        scheduler.submit(stuck);
        assert_eq!(
            stuck_ticket.wait().await,
            Err(PlaybackError::Timeout {
                stage: VoiceStage::Connect
            })
        );
        assert!(start.elapsed() >= Duration::from_millis(30));

        let resumed = Instant::now();
        let (next, next_ticket) = stored(&path, G1);
        scheduler.submit(next);
        assert_eq!(next_ticket.wait().await, Ok(()));
        assert!(resumed.elapsed() < Duration::from_millis(30));
        assert_eq!(voice.calls().last(), Some(&Call::Disconnect(G1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_behind_stuck_connect_still_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice {
            hanging_connects: AtomicUsize::new(1),
            ..Default::default()
        });
        let timeouts = VoiceTimeouts {
            connect: Duration::from_millis(30),
            ..Default::default()
        };
        let scheduler = scheduler(voice, empty_channels(), timeouts);
        let path = clip(&dir, "clip.mp3");

        let (stuck, stuck_ticket) = stored(&path, G1);
        let (next, next_ticket) = stored(&path, G1);
        scheduler.submit(stuck);
        scheduler.submit(next);

        assert!(matches!(
            stuck_ticket.wait().await,
            Err(PlaybackError::Timeout { .. })
        ));
        assert_eq!(next_ticket.wait().await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_failure_is_reported_and_voice_released() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice {
            failing_plays: AtomicUsize::new(1),
            ..Default::default()
        });
        let scheduler = scheduler(voice.clone(), empty_channels(), VoiceTimeouts::default());
        let path = clip(&dir, "clip.mp3");

        let (broken, broken_ticket) = stored(&path, G1);
        let (fine, fine_ticket) = stored(&path, G1);
        scheduler.submit(broken);
        scheduler.submit(fine);

        match broken_ticket.wait().await {
            Err(PlaybackError::PlaybackFailed { cause }) => {
                assert!(cause.contains("decoder exploded"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(fine_ticket.wait().await, Ok(()));
        assert_eq!(voice.calls()[2], Call::Disconnect(G1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_source_is_reported() {
        let voice = Arc::new(FakeVoice::default());
        let scheduler = scheduler(voice.clone(), empty_channels(), VoiceTimeouts::default());
        let missing = PathBuf::from("/definitely/not/here.mp3");

        let (request, ticket) = stored(&missing, G1);
        scheduler.submit(request);

        assert_eq!(
            ticket.wait().await,
            Err(PlaybackError::SourceMissing { path: missing })
        );
        assert!(voice.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_moves_when_already_in_another_channel() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice::default());
        voice.connected.lock().insert(G1, ChannelId::new(999));
        let scheduler = scheduler(voice.clone(), empty_channels(), VoiceTimeouts::default());

        let (request, ticket) = stored(&clip(&dir, "clip.mp3"), G1);
        scheduler.submit(request);

        assert_eq!(ticket.wait().await, Ok(()));
        assert_eq!(voice.calls()[0], Call::Move(G1, C1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_temporary_source_deleted_after_playback() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice::default());
        let scheduler = scheduler(voice, empty_channels(), VoiceTimeouts::default());
        let path = clip(&dir, "tts.mp3");

        let (request, ticket) = PlaybackRequest::new(
            AudioSource::Temporary(path.clone()),
            VoiceTarget::new(G1, C1),
        );
        scheduler.submit(request);

        assert_eq!(ticket.wait().await, Ok(()));
        // El borrado ocurre justo después de resolver el ticket
        while scheduler.is_draining(G1) {
            tokio::task::yield_now().await;
        }
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_request_is_skipped_but_cleaned_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice {
            play_delays: HashMap::from([(G1, Duration::from_secs(5))]),
            ..Default::default()
        });
        let scheduler = scheduler(voice.clone(), empty_channels(), VoiceTimeouts::default());
        let first_path = clip(&dir, "first.mp3");
        let abandoned_path = clip(&dir, "abandoned.mp3");

        let (first, first_ticket) = stored(&first_path, G1);
        let (abandoned, abandoned_ticket) = PlaybackRequest::new(
            AudioSource::Temporary(abandoned_path.clone()),
            VoiceTarget::new(G1, C1),
        );
        scheduler.submit(first);
        scheduler.submit(abandoned);

        let outcome = abandoned_ticket.wait_timeout(Duration::from_secs(1)).await;
        assert!(matches!(outcome, Err(PlaybackError::Timeout { .. })));

        assert_eq!(first_ticket.wait().await, Ok(()));
        while scheduler.is_draining(G1) {
            tokio::task::yield_now().await;
        }

        let played: Vec<_> = voice
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Play(..)))
            .collect();
        assert_eq!(played, vec![Call::Play(G1, first_path)]);
        assert!(!abandoned_path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submitters_share_one_voice_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let voice = Arc::new(FakeVoice {
            play_delays: HashMap::from([(G1, Duration::from_millis(2))]),
            ..Default::default()
        });
        let scheduler = scheduler(voice.clone(), empty_channels(), VoiceTimeouts::default());

        let submitters: Vec<_> = (0..20)
            .map(|i| {
                let scheduler = scheduler.clone();
                let path = clip(&dir, &format!("clip-{i}.mp3"));
                tokio::spawn(async move {
                    let (request, ticket) = stored(&path, G1);
                    scheduler.submit(request);
                    ticket.wait().await
                })
            })
            .collect();

        for submitter in submitters {
            assert_eq!(submitter.await.expect("submitter task"), Ok(()));
        }

        assert_eq!(voice.max_active_plays.load(Ordering::SeqCst), 1);
        let calls = voice.calls();
        assert_eq!(calls.len(), 60);
        for session in calls.chunks(3) {
            assert_eq!(session[0], Call::Connect(G1, C1));
            assert!(matches!(session[1], Call::Play(G1, _)));
            assert_eq!(session[2], Call::Disconnect(G1));
        }
    }
}
