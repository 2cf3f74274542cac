use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::BTreeSet;
use tourdesk_core::{CoreError, CoreResult, Reservation, SeatLedger};
use tracing::{debug, info};
use uuid::Uuid;

// Layout per tour:
//   tour:{id}:seats            hash   seat -> booking id
//   tour:{id}:booking:{bid}    set    seats held by that booking
// Every write runs as one script, so a tour is never seen half-written.

const RESERVE: &str = r#"
    local contested = {}
    for i = 2, #ARGV do
        local holder = redis.call("HGET", KEYS[1], ARGV[i])
        if holder and holder ~= ARGV[1] then
            table.insert(contested, tonumber(ARGV[i]))
        end
    end
    if #contested > 0 then
        return contested
    end
    for i = 2, #ARGV do
        redis.call("HSET", KEYS[1], ARGV[i], ARGV[1])
        redis.call("SADD", KEYS[2], ARGV[i])
    end
    return {}
"#;

const REPLACE: &str = r#"
    local contested = {}
    local wanted = {}
    for i = 2, #ARGV do
        wanted[ARGV[i]] = true
        local holder = redis.call("HGET", KEYS[1], ARGV[i])
        if holder and holder ~= ARGV[1] then
            table.insert(contested, tonumber(ARGV[i]))
        end
    end
    if #contested > 0 then
        return contested
    end
    for _, seat in ipairs(redis.call("SMEMBERS", KEYS[2])) do
        if not wanted[seat] then
            if redis.call("HGET", KEYS[1], seat) == ARGV[1] then
                redis.call("HDEL", KEYS[1], seat)
            end
            redis.call("SREM", KEYS[2], seat)
        end
    end
    for i = 2, #ARGV do
        redis.call("HSET", KEYS[1], ARGV[i], ARGV[1])
        redis.call("SADD", KEYS[2], ARGV[i])
    end
    return {}
"#;

const RELEASE: &str = r#"
    local freed = {}
    for i = 2, #ARGV do
        if redis.call("SREM", KEYS[2], ARGV[i]) == 1 then
            if redis.call("HGET", KEYS[1], ARGV[i]) == ARGV[1] then
                redis.call("HDEL", KEYS[1], ARGV[i])
            end
            table.insert(freed, tonumber(ARGV[i]))
        end
    end
    return freed
"#;

const RELEASE_ALL: &str = r#"
    local freed = {}
    for _, seat in ipairs(redis.call("SMEMBERS", KEYS[2])) do
        if redis.call("HGET", KEYS[1], seat) == ARGV[1] then
            redis.call("HDEL", KEYS[1], seat)
        end
        table.insert(freed, tonumber(seat))
    end
    redis.call("DEL", KEYS[2])
    return freed
"#;

fn seats_key(tour_id: Uuid) -> String {
    format!("tour:{}:seats", tour_id)
}

fn booking_key(tour_id: Uuid, booking_id: Uuid) -> String {
    format!("tour:{}:booking:{}", tour_id, booking_id)
}

fn storage(e: redis::RedisError) -> CoreError {
    CoreError::StorageError(e.to_string())
}

fn outcome(contested: Vec<u32>) -> Reservation {
    if contested.is_empty() {
        Reservation::Committed
    } else {
        Reservation::Contested(contested.into_iter().collect())
    }
}

/// Seat ledger shared by every API instance pointed at the same Redis.
#[derive(Clone)]
pub struct RedisSeatLedger {
    client: redis::Client,
    reserve: redis::Script,
    replace: redis::Script,
    release: redis::Script,
    release_all: redis::Script,
}

impl RedisSeatLedger {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            reserve: redis::Script::new(RESERVE),
            replace: redis::Script::new(REPLACE),
            release: redis::Script::new(RELEASE),
            release_all: redis::Script::new(RELEASE_ALL),
        })
    }

    async fn connection(&self) -> CoreResult<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await.map_err(storage)
    }

    async fn run(
        &self,
        script: &redis::Script,
        tour_id: Uuid,
        booking_id: Uuid,
        seats: &BTreeSet<u32>,
    ) -> CoreResult<Vec<u32>> {
        let mut conn = self.connection().await?;
        let seats: Vec<u32> = seats.iter().copied().collect();
        script
            .key(seats_key(tour_id))
            .key(booking_key(tour_id, booking_id))
            .arg(booking_id.to_string())
            .arg(seats)
            .invoke_async(&mut conn)
            .await
            .map_err(storage)
    }
}

#[async_trait]
impl SeatLedger for RedisSeatLedger {
    async fn occupied(&self, tour_id: Uuid) -> CoreResult<BTreeSet<u32>> {
        let mut conn = self.connection().await?;
        let seats: Vec<u32> = conn.hkeys(seats_key(tour_id)).await.map_err(storage)?;
        debug!(%tour_id, count = seats.len(), "Occupancy read from redis");
        Ok(seats.into_iter().collect())
    }

    async fn held_by(&self, tour_id: Uuid, booking_id: Uuid) -> CoreResult<BTreeSet<u32>> {
        let mut conn = self.connection().await?;
        let seats: Vec<u32> = conn
            .smembers(booking_key(tour_id, booking_id))
            .await
            .map_err(storage)?;
        Ok(seats.into_iter().collect())
    }

    async fn try_reserve(
        &self,
        tour_id: Uuid,
        booking_id: Uuid,
        seats: &BTreeSet<u32>,
    ) -> CoreResult<Reservation> {
        let contested = self.run(&self.reserve, tour_id, booking_id, seats).await?;
        Ok(outcome(contested))
    }

    async fn try_replace(
        &self,
        tour_id: Uuid,
        booking_id: Uuid,
        seats: &BTreeSet<u32>,
    ) -> CoreResult<Reservation> {
        let contested = self.run(&self.replace, tour_id, booking_id, seats).await?;
        Ok(outcome(contested))
    }

    async fn release_seats(
        &self,
        tour_id: Uuid,
        booking_id: Uuid,
        seats: &BTreeSet<u32>,
    ) -> CoreResult<BTreeSet<u32>> {
        if seats.is_empty() {
            return Ok(BTreeSet::new());
        }
        let freed = self.run(&self.release, tour_id, booking_id, seats).await?;
        Ok(freed.into_iter().collect())
    }

    async fn release_all(&self, tour_id: Uuid, booking_id: Uuid) -> CoreResult<BTreeSet<u32>> {
        let freed = self
            .run(&self.release_all, tour_id, booking_id, &BTreeSet::new())
            .await?;
        if !freed.is_empty() {
            info!(%tour_id, %booking_id, ?freed, "Seats released in redis");
        }
        Ok(freed.into_iter().collect())
    }
}
