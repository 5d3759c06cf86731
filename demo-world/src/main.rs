use std::collections::HashMap;

use anyhow::{Context, Result};
use blocks::{
    encode_update_blocks, BlockCache, BlockRegistry, DirtyFlagSet, UpdateFlag,
};
use buffer::{BufferResult, ByteOrder, GameBuffer, Transform};
use clap::Parser;
use grid::{
    Candidate, ChunkBatch, ChunkManager, Durability, EntityCategory, EntityId, GridLimits,
    LocalList, Position, PriorityFactors, RequestSource, UpdateRequest, UpdateSink, Visibility,
};
use serde::Serialize;
use wire::{FrameLimits, Framer, MessageLength, SEED_WORDS};

const GROUPED_UPDATE_OPCODE: u8 = 60;
const FIRST_SIGHT_OPCODE: u8 = 61;
const EXTENSION_BIT: u16 = 0x40;

#[derive(Parser)]
#[command(
    name = "demo-world",
    version,
    about = "Deterministic world-sync demo run"
)]
struct Cli {
    /// Number of wandering NPCs.
    #[arg(long, default_value_t = 24)]
    npcs: u32,
    /// Number of observers.
    #[arg(long, default_value_t = 4)]
    observers: u32,
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 100)]
    ticks: u64,
    /// RNG seed for deterministic results.
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

/// Tiny deterministic generator; no external randomness in the demo.
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed | 1)
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}

/// The attribute state block encoders read from.
struct NpcState {
    id: EntityId,
    chat_line: u8,
    animation: u16,
}

struct Npc {
    state: NpcState,
    position: Position,
    flags: DirtyFlagSet,
    cache: BlockCache,
}

struct Observer {
    id: EntityId,
    position: Position,
    previous: Position,
    tracked_npcs: LocalList,
}

/// Visibility lookups for persistent replays.
#[derive(Default)]
struct DemoWorld {
    visibilities: HashMap<EntityId, Visibility>,
}

impl RequestSource for DemoWorld {
    fn current_visibility(&self, source: EntityId) -> Option<Visibility> {
        self.visibilities.get(&source).cloned()
    }
}

/// Frames every batch for one connection and counts the bytes.
struct ConnectionSink {
    framer: Framer,
    bytes_this_tick: usize,
}

impl UpdateSink for ConnectionSink {
    type Error = wire::WireError;

    fn send(&mut self, _observer: EntityId, batch: ChunkBatch) -> Result<(), wire::WireError> {
        let mut payload = GameBuffer::new();
        payload
            .put_u8(u8::from(batch.clear_first), Transform::Normal)
            .map_err(wire::WireError::Buffer)?;
        for message in &batch.messages {
            payload.put_bytes(message).map_err(wire::WireError::Buffer)?;
        }

        let mut out = GameBuffer::new();
        self.framer.frame(
            &mut out,
            GROUPED_UPDATE_OPCODE,
            MessageLength::VariableShort,
            payload.as_slice(),
        )?;
        self.bytes_this_tick += out.len();
        Ok(())
    }
}

fn encode_chat(npc: &NpcState, out: &mut GameBuffer) -> BufferResult<()> {
    out.put_u8(npc.chat_line, Transform::Add)
}

fn encode_animation(npc: &NpcState, out: &mut GameBuffer) -> BufferResult<()> {
    out.put_u16(npc.animation, Transform::Normal, ByteOrder::Little)
}

fn encode_appearance(npc: &NpcState, out: &mut GameBuffer) -> BufferResult<()> {
    out.put_u32(npc.id.raw(), Transform::Normal, ByteOrder::Middle)
}

fn npc_registry() -> blocks::BlockResult<BlockRegistry<NpcState>> {
    BlockRegistry::builder(EXTENSION_BIT)
        .descriptor(UpdateFlag::Appearance, 0x10, encode_appearance)
        .descriptor(UpdateFlag::Chat, 0x80, encode_chat)
        .descriptor(UpdateFlag::Animation, 0x8, encode_animation)
        .build()
}

#[derive(Serialize)]
struct Summary {
    npcs: u32,
    observers: u32,
    ticks: u64,
    seed: u64,
    batches: usize,
    messages: usize,
    admissions: usize,
    total_bytes: usize,
    p95_tick_bytes: usize,
    live_chunks: usize,
}

fn percentile_95(samples: &mut [usize]) -> usize {
    if samples.is_empty() {
        return 0;
    }
    samples.sort_unstable();
    let rank = (samples.len() * 95).div_ceil(100);
    samples[rank.saturating_sub(1)]
}

fn spawn_position(rng: &mut Rng) -> Position {
    Position::new(
        3200 + rng.below(48) as i32,
        3200 + rng.below(48) as i32,
        0,
    )
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let registry = npc_registry().context("build npc block registry")?;

    let mut rng = Rng::new(cli.seed);
    let mut manager = ChunkManager::new(GridLimits::default());
    let mut world = DemoWorld::default();

    let mut npcs: Vec<Npc> = (0..cli.npcs)
        .map(|index| Npc {
            state: NpcState {
                id: EntityId::new(index),
                chat_line: 0,
                animation: 0,
            },
            position: spawn_position(&mut rng),
            flags: DirtyFlagSet::default(),
            cache: BlockCache::new(),
        })
        .collect();
    for npc in &npcs {
        manager
            .add_entity(npc.state.id, EntityCategory::Npc, npc.position)
            .context("seed npc into grid")?;
    }

    let mut observers: Vec<Observer> = (0..cli.observers)
        .map(|index| {
            let position = spawn_position(&mut rng);
            Observer {
                id: EntityId::new(10_000 + index),
                position,
                previous: position,
                tracked_npcs: LocalList::new(8),
            }
        })
        .collect();
    let mut sinks: Vec<ConnectionSink> = observers
        .iter()
        .map(|observer| {
            let raw = observer.id.raw();
            let seed: [u32; SEED_WORDS] = [raw, raw ^ 0x5DEE_CE66, cli.seed as u32, 77];
            ConnectionSink {
                framer: Framer::new(&seed, FrameLimits::default()),
                bytes_this_tick: 0,
            }
        })
        .collect();

    let mut summary = Summary {
        npcs: cli.npcs,
        observers: cli.observers,
        ticks: cli.ticks,
        seed: cli.seed,
        batches: 0,
        messages: 0,
        admissions: 0,
        total_bytes: 0,
        p95_tick_bytes: 0,
        live_chunks: 0,
    };
    let mut tick_bytes: Vec<usize> = Vec::with_capacity(cli.ticks as usize);

    for tick in 1..=cli.ticks {
        // Logic phase: wander, chatter, animate.
        for npc in &mut npcs {
            if rng.below(4) == 0 {
                let next = Position::new(
                    npc.position.x() + rng.below(3) as i32 - 1,
                    npc.position.y() + rng.below(3) as i32 - 1,
                    0,
                );
                manager
                    .move_entity(npc.state.id, EntityCategory::Npc, npc.position, next)
                    .context("wander npc")?;
                npc.position = next;
            }
            if rng.below(8) == 0 {
                npc.state.chat_line = rng.below(200) as u8;
                npc.flags.set(UpdateFlag::Chat);
            }
            if rng.below(3) == 0 {
                npc.state.animation = rng.below(0x700) as u16;
                npc.flags.set(UpdateFlag::Animation);
            }
        }

        // One durable object placement partway through the run; its record
        // replays for any observer whose view later re-enters the chunk.
        if tick == 10 {
            let object = EntityId::new(90_000);
            let mut message = GameBuffer::new();
            message
                .put_u16(4151, Transform::Normal, ByteOrder::Big)
                .context("encode object placement")?;
            let bytes = message.into_bytes();
            world
                .visibilities
                .insert(object, Visibility::Global);
            let chunk = spawn_position(&mut rng).chunk_coordinate();
            manager.enqueue(
                chunk,
                UpdateRequest::new(object, bytes.clone(), Visibility::Global),
                Durability::Transient,
            );
            manager.enqueue(
                chunk,
                UpdateRequest::new(object, bytes, Visibility::Global),
                Durability::Persistent,
            );
        }

        // Encode one shared record per dirty NPC and queue it on its chunk.
        for npc in &mut npcs {
            if npc.flags.is_empty() {
                continue;
            }
            let record = encode_update_blocks(
                &registry,
                &npc.state,
                &npc.flags,
                &[],
                tick,
                &mut npc.cache,
            )
            .context("encode npc blocks")?;
            manager.enqueue(
                npc.position.chunk_coordinate(),
                UpdateRequest::new(npc.state.id, record, Visibility::Global),
                Durability::Transient,
            );
        }

        // Network-flush phase: every observer, then the single reset.
        for (observer, sink) in observers.iter_mut().zip(&mut sinks) {
            sink.bytes_this_tick = 0;
            let report = manager.dispatch_updates(
                observer.id,
                observer.position,
                observer.previous,
                tick == 1,
                &world,
                sink,
            );
            summary.batches += report.batches;
            summary.messages += report.messages;
            observer.previous = observer.position;

            // Admit nearby NPCs into the bounded tracking list; newly
            // admitted ones get a forced-appearance record, bypassing the
            // shared cache for this observer only.
            let candidates: Vec<Candidate> = npcs
                .iter()
                .filter(|npc| !observer.tracked_npcs.contains(npc.state.id))
                .filter(|npc| npc.position.chebyshev_distance(observer.position) <= 15)
                .map(|npc| Candidate {
                    entity: npc.state.id,
                    factors: PriorityFactors {
                        distance: npc.position.chebyshev_distance(observer.position),
                        known_contact: false,
                        size: 1,
                        level: u32::from(npc.state.chat_line),
                        in_combat: false,
                    },
                })
                .collect();
            for admitted in observer.tracked_npcs.admit(candidates) {
                let npc = npcs
                    .iter_mut()
                    .find(|npc| npc.state.id == admitted)
                    .context("admitted npc exists")?;
                let record = encode_update_blocks(
                    &registry,
                    &npc.state,
                    &npc.flags,
                    &[UpdateFlag::Appearance],
                    tick,
                    &mut npc.cache,
                )
                .context("encode first-sight blocks")?;
                let mut out = GameBuffer::new();
                sink.framer
                    .frame(
                        &mut out,
                        FIRST_SIGHT_OPCODE,
                        MessageLength::VariableByte,
                        &record,
                    )
                    .context("frame first-sight record")?;
                sink.bytes_this_tick += out.len();
                summary.admissions += 1;
            }

            summary.total_bytes += sink.bytes_this_tick;
        }

        let bytes: usize = sinks.iter().map(|sink| sink.bytes_this_tick).sum();
        tick_bytes.push(bytes);

        for npc in &mut npcs {
            npc.flags.clear();
        }
        manager.reset_touched_chunks();
        if tick % 50 == 0 {
            let evicted = manager.evict_idle();
            if evicted > 0 {
                log::info!("evicted {evicted} idle chunks at tick {tick}");
            }
        }
    }

    summary.p95_tick_bytes = percentile_95(&mut tick_bytes);
    summary.live_chunks = manager.chunk_count();

    let rendered =
        serde_json::to_string_pretty(&summary).context("serialize run summary")?;
    println!("{rendered}");
    Ok(())
}
