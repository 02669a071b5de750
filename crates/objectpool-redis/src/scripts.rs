//! The seven atomic scripts, one `redis::Script` factory each.
//!
//! Every key is built inside Lua from a `prefix` argument rather than
//! passed through `KEYS[]` (see the module doc on [`crate::RedisPoolStore`]
//! for why). Variable-arity arguments (object lists, tag maps) cross the
//! `EVAL` boundary as `cjson`-encoded strings; scalars go in as plain
//! `ARGV` entries. Lua tables that are empty on the wire are force-typed
//! as JSON arrays with `__jsontype` so an empty result never round-trips
//! as `{}` instead of `[]`.

use redis::Script;

const AS_ARRAY: &str = r#"
local function as_array(t)
    return setmetatable(t, { __jsontype = "array" })
end
"#;

pub fn queue_tagged() -> Script {
    Script::new(&format!(
        r#"{as_array}
local prefix = ARGV[1]
local tags = cjson.decode(ARGV[2])
local objects = cjson.decode(ARGV[3])
local delay_seconds = tonumber(ARGV[4])

local has_tags = false
for _ in pairs(tags) do
    has_tags = true
    break
end

local new_objects = {{}}
for _, o in ipairs(objects) do
    if redis.call("SISMEMBER", prefix .. ":all", o) == 0 then
        local dup = false
        for _, seen in ipairs(new_objects) do
            if seen == o then
                dup = true
                break
            end
        end
        if not dup then
            table.insert(new_objects, o)
        end
    end
end

if #new_objects == 0 then
    return cjson.encode(as_array(new_objects))
end

for _, o in ipairs(new_objects) do
    redis.call("SADD", prefix .. ":all", o)
    if has_tags then
        for t, v in pairs(tags) do
            redis.call("HSET", prefix .. ":tags:" .. o, t, v)
        end
    end
end

if delay_seconds > 0 then
    for _, o in ipairs(new_objects) do
        redis.call("RPUSH", prefix .. ":delayed-queue", o)
        redis.call("SETEX", prefix .. ":delay:" .. o, delay_seconds, "")
    end
else
    for _, o in ipairs(new_objects) do
        redis.call("SADD", prefix .. ":queued", o)
        redis.call("RPUSH", prefix .. ":queue", o)
        if has_tags then
            for t, v in pairs(tags) do
                redis.call("RPUSH", prefix .. ":tagged-queue:" .. t .. ":" .. v, o)
            end
        end
    end
    redis.call("PUBLISH", prefix .. ":queued", "1")
end

return cjson.encode(as_array(new_objects))
"#,
        as_array = AS_ARRAY
    ))
}

pub fn claim() -> Script {
    Script::new(&format!(
        r#"{as_array}
local prefix = ARGV[1]
local max_count = tonumber(ARGV[2])
local expiration_seconds = tonumber(ARGV[3])
local session = ARGV[4]
local tag = ARGV[5]
if tag == "" then
    tag = nil
end

local popped = {{}}

local function remove_from_tagged_queues(o)
    local tags = redis.call("HGETALL", prefix .. ":tags:" .. o)
    for i = 1, #tags, 2 do
        local t, v = tags[i], tags[i + 1]
        local key = prefix .. ":tagged-queue:" .. t .. ":" .. v
        redis.call("LREM", key, 0, o)
        if redis.call("LLEN", key) == 0 then
            redis.call("DEL", key)
        end
    end
end

local function finalize(o)
    redis.call("SREM", prefix .. ":queued", o)
    redis.call("SETEX", prefix .. ":session:" .. o, expiration_seconds, session)
    remove_from_tagged_queues(o)
    redis.call("RPUSH", prefix .. ":claimed", o)
end

if max_count > 0 then
    if tag ~= nil and max_count >= 2 then
        local head = redis.call("LPOP", prefix .. ":queue")
        if head then
            local value = redis.call("HGET", prefix .. ":tags:" .. head, tag)
            finalize(head)
            table.insert(popped, head)

            if value then
                local tagged_key = prefix .. ":tagged-queue:" .. tag .. ":" .. value
                for _ = 1, max_count - 1 do
                    local o = redis.call("LPOP", tagged_key)
                    if not o then
                        break
                    end
                    redis.call("LREM", prefix .. ":queue", 0, o)
                    finalize(o)
                    table.insert(popped, o)
                end
            end
        end
    else
        for _ = 1, max_count do
            local o = redis.call("LPOP", prefix .. ":queue")
            if not o then
                break
            end
            finalize(o)
            table.insert(popped, o)
        end
    end
end

return cjson.encode({{ session = session, objects = as_array(popped) }})
"#,
        as_array = AS_ARRAY
    ))
}

pub fn extend() -> Script {
    Script::new(
        r#"
local prefix = ARGV[1]
local objects = cjson.decode(ARGV[2])
local session = ARGV[3]
local expiration_seconds = tonumber(ARGV[4])

for _, o in ipairs(objects) do
    if redis.call("GET", prefix .. ":session:" .. o) ~= session then
        return 0
    end
end

for _, o in ipairs(objects) do
    redis.call("SETEX", prefix .. ":session:" .. o, expiration_seconds, session)
    redis.call("LREM", prefix .. ":claimed", 0, o)
    redis.call("RPUSH", prefix .. ":claimed", o)
end

return 1
"#,
    )
}

pub fn release() -> Script {
    Script::new(
        r#"
local prefix = ARGV[1]
local objects = cjson.decode(ARGV[2])
local session = ARGV[3]

for _, o in ipairs(objects) do
    if redis.call("GET", prefix .. ":session:" .. o) ~= session then
        return 0
    end
end

for _, o in ipairs(objects) do
    redis.call("DEL", prefix .. ":session:" .. o)
    redis.call("DEL", prefix .. ":tags:" .. o)
    redis.call("SREM", prefix .. ":all", o)
    redis.call("LREM", prefix .. ":claimed", 0, o)
end

return 1
"#,
    )
}

pub fn requeue() -> Script {
    Script::new(
        r#"
local prefix = ARGV[1]
local objects = cjson.decode(ARGV[2])
local session = ARGV[3]
local delay_seconds = tonumber(ARGV[4])

for _, o in ipairs(objects) do
    if redis.call("GET", prefix .. ":session:" .. o) ~= session then
        return 0
    end
end

for _, o in ipairs(objects) do
    redis.call("DEL", prefix .. ":session:" .. o)
    redis.call("LREM", prefix .. ":claimed", 0, o)
end

if delay_seconds > 0 then
    for _, o in ipairs(objects) do
        redis.call("RPUSH", prefix .. ":delayed-queue", o)
        redis.call("SETEX", prefix .. ":delay:" .. o, delay_seconds, "")
    end
else
    for _, o in ipairs(objects) do
        redis.call("SADD", prefix .. ":queued", o)
        redis.call("RPUSH", prefix .. ":queue", o)
        local tags = redis.call("HGETALL", prefix .. ":tags:" .. o)
        for i = 1, #tags, 2 do
            local t, v = tags[i], tags[i + 1]
            redis.call("RPUSH", prefix .. ":tagged-queue:" .. t .. ":" .. v, o)
        end
    end
    redis.call("PUBLISH", prefix .. ":queued", "1")
end

return 1
"#,
    )
}

pub fn clean_expired() -> Script {
    Script::new(&format!(
        r#"{as_array}
local prefix = ARGV[1]
local moved = {{}}

while true do
    local head = redis.call("LINDEX", prefix .. ":claimed", 0)
    if not head then
        break
    end
    if redis.call("EXISTS", prefix .. ":session:" .. head) == 1 then
        break
    end
    redis.call("LPOP", prefix .. ":claimed")
    redis.call("SADD", prefix .. ":queued", head)
    redis.call("RPUSH", prefix .. ":queue", head)
    local tags = redis.call("HGETALL", prefix .. ":tags:" .. head)
    for i = 1, #tags, 2 do
        local t, v = tags[i], tags[i + 1]
        redis.call("RPUSH", prefix .. ":tagged-queue:" .. t .. ":" .. v, head)
    end
    table.insert(moved, head)
end

if #moved > 0 then
    redis.call("PUBLISH", prefix .. ":queued", "1")
end

return cjson.encode(as_array(moved))
"#,
        as_array = AS_ARRAY
    ))
}

pub fn clean_delayed() -> Script {
    Script::new(&format!(
        r#"{as_array}
local prefix = ARGV[1]
local moved = {{}}

while true do
    local head = redis.call("LINDEX", prefix .. ":delayed-queue", 0)
    if not head then
        break
    end
    if redis.call("EXISTS", prefix .. ":delay:" .. head) == 1 then
        break
    end
    redis.call("LPOP", prefix .. ":delayed-queue")
    redis.call("SADD", prefix .. ":queued", head)
    redis.call("RPUSH", prefix .. ":queue", head)
    local tags = redis.call("HGETALL", prefix .. ":tags:" .. head)
    for i = 1, #tags, 2 do
        local t, v = tags[i], tags[i + 1]
        redis.call("RPUSH", prefix .. ":tagged-queue:" .. t .. ":" .. v, head)
    end
    table.insert(moved, head)
end

if #moved > 0 then
    redis.call("PUBLISH", prefix .. ":queued", "1")
end

return cjson.encode(as_array(moved))
"#,
        as_array = AS_ARRAY
    ))
}
