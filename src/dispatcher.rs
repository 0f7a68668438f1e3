//! Command dispatch over the shared namespace (spec.md §4.7).
//!
//! Ported from `common/req.cxx`: `Request::get/set/del/zadd/zrem/zscore/
//! zquery/keys`, `expectZSet`, the `strToDouble`/`strToInt` argument
//! parsers, and the case-insensitive `isCommand` dispatch chain.

use log::{log_enabled, trace, Level};

use crate::entry::{all_keys, key_code, Entry, EntryKind, Namespace};
use crate::errors::CommandError;
use crate::protocol::reply::Reply;

/// Dispatch one already-parsed request (command name plus arguments) over
/// the shared namespace, returning a reply. Every path here produces a
/// tagged reply — the dispatcher never panics on malformed *command*
/// input (malformed *framing* is rejected earlier, before a command is
/// ever reached).
pub fn dispatch(ns: &mut Namespace, args: &[Vec<u8>]) -> Reply {
    if args.is_empty() {
        return Reply::err(CommandError::Unknown);
    }
    let cmd = args[0].as_slice();
    if log_enabled!(Level::Trace) {
        trace!("dispatch {}", String::from_utf8_lossy(cmd));
    }

    match (args.len(), cmd) {
        (1, c) if is_cmd(c, b"keys") => keys(ns),
        (2, c) if is_cmd(c, b"get") => get(ns, &args[1]),
        (3, c) if is_cmd(c, b"set") => set(ns, &args[1], &args[2]),
        (2, c) if is_cmd(c, b"del") => del(ns, &args[1]),
        (4, c) if is_cmd(c, b"zadd") => zadd(ns, &args[1], &args[2], &args[3]),
        (3, c) if is_cmd(c, b"zrem") => zrem(ns, &args[1], &args[2]),
        (3, c) if is_cmd(c, b"zscore") => zscore(ns, &args[1], &args[2]),
        (6, c) if is_cmd(c, b"zquery") => {
            zquery(ns, &args[1], &args[2], &args[3], &args[4], &args[5])
        }
        _ => Reply::err(CommandError::Unknown),
    }
}

fn is_cmd(word: &[u8], name: &'static [u8]) -> bool {
    word.eq_ignore_ascii_case(name)
}

fn parse_f64(s: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(s).ok()?;
    let value: f64 = text.parse().ok()?;
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

fn parse_i64(s: &[u8]) -> Option<i64> {
    std::str::from_utf8(s).ok()?.parse().ok()
}

fn keys(ns: &Namespace) -> Reply {
    Reply::Arr(all_keys(ns).into_iter().map(Reply::Str).collect())
}

fn get(ns: &mut Namespace, key: &[u8]) -> Reply {
    let code = key_code(key);
    match ns.lookup(code, |e| e.key == key) {
        None => Reply::Nil,
        Some(entry) => match &entry.kind {
            EntryKind::String(v) => Reply::Str(v.clone()),
            EntryKind::SortedSet(_) => Reply::err(CommandError::Type),
        },
    }
}

fn set(ns: &mut Namespace, key: &[u8], value: &[u8]) -> Reply {
    let code = key_code(key);
    if let Some(existing) = ns.pop(code, |e| e.key == key) {
        match &existing.kind {
            EntryKind::SortedSet(_) => {
                // Resolved open question (spec.md §9): overwriting a
                // sorted-set key with `set` is rejected, not allowed as a
                // silent type change. Put the entry back untouched.
                ns.insert(code, existing);
                return Reply::err(CommandError::Type);
            }
            EntryKind::String(_) => {}
        }
    }
    ns.insert(code, Entry { key: key.to_vec(), kind: EntryKind::String(value.to_vec()) });
    Reply::Nil
}

fn del(ns: &mut Namespace, key: &[u8]) -> Reply {
    let code = key_code(key);
    match ns.pop(code, |e| e.key == key) {
        Some(_) => Reply::Int(1),
        None => Reply::Int(0),
    }
}

/// Look up `key` expecting it to hold a sorted set. `Ok(None)` means the
/// key is absent (caller replies `NIL` or, for `zquery`, an empty `ARR`);
/// `Err` is a ready-made `ERR(TYPE)` reply.
fn expect_zset<'a>(ns: &'a mut Namespace, key: &[u8]) -> Result<Option<&'a mut Entry>, Reply> {
    let code = key_code(key);
    match ns.lookup_mut(code, |e| e.key == key) {
        None => Ok(None),
        Some(entry) => match &entry.kind {
            EntryKind::SortedSet(_) => Ok(Some(entry)),
            EntryKind::String(_) => Err(Reply::err(CommandError::Type)),
        },
    }
}

fn zadd(ns: &mut Namespace, key: &[u8], score_arg: &[u8], name: &[u8]) -> Reply {
    let score = match parse_f64(score_arg) {
        Some(v) => v,
        None => return Reply::err(CommandError::Arg),
    };

    let code = key_code(key);
    if ns.lookup(code, |e| e.key == key).is_none() {
        ns.insert(
            code,
            Entry { key: key.to_vec(), kind: EntryKind::SortedSet(Default::default()) },
        );
    }

    match ns.lookup_mut(code, |e| e.key == key) {
        Some(entry) => match &mut entry.kind {
            EntryKind::SortedSet(set) => Reply::Int(set.add(name, score) as i64),
            EntryKind::String(_) => Reply::err(CommandError::Type),
        },
        None => unreachable!("just inserted"),
    }
}

fn zrem(ns: &mut Namespace, key: &[u8], name: &[u8]) -> Reply {
    match expect_zset(ns, key) {
        Err(type_err) => type_err,
        Ok(None) => Reply::Int(0),
        Ok(Some(entry)) => match &mut entry.kind {
            EntryKind::SortedSet(set) => Reply::Int(set.pop(name).is_some() as i64),
            EntryKind::String(_) => unreachable!(),
        },
    }
}

fn zscore(ns: &mut Namespace, key: &[u8], name: &[u8]) -> Reply {
    match expect_zset(ns, key) {
        Err(type_err) => type_err,
        Ok(None) => Reply::Nil,
        Ok(Some(entry)) => match &mut entry.kind {
            EntryKind::SortedSet(set) => match set.lookup(name) {
                Some(score) => Reply::Dbl(score),
                None => Reply::Nil,
            },
            EntryKind::String(_) => unreachable!(),
        },
    }
}

fn zquery(
    ns: &mut Namespace,
    key: &[u8],
    score_arg: &[u8],
    name: &[u8],
    offset_arg: &[u8],
    limit_arg: &[u8],
) -> Reply {
    let score = match parse_f64(score_arg) {
        Some(v) => v,
        None => return Reply::err(CommandError::Arg),
    };
    let offset = match parse_i64(offset_arg) {
        Some(v) => v,
        None => return Reply::err(CommandError::Arg),
    };
    let limit = match parse_i64(limit_arg) {
        Some(v) => v,
        None => return Reply::err(CommandError::Arg),
    };

    let entry = match expect_zset(ns, key) {
        Err(type_err) => return type_err,
        Ok(None) => return Reply::Arr(Vec::new()),
        Ok(Some(entry)) => entry,
    };
    let set = match &entry.kind {
        EntryKind::SortedSet(set) => set,
        EntryKind::String(_) => unreachable!(),
    };

    if limit <= 0 {
        return Reply::Arr(Vec::new());
    }

    let mut items = Vec::new();
    let start = set.query(score, name).cloned();
    let mut current = match start {
        Some(m) => set.offset(&m, offset).cloned(),
        None => None,
    };
    let mut n = 0i64;
    while let Some(member) = current {
        if n / 2 >= limit {
            break;
        }
        items.push(Reply::Str(member.name.clone()));
        items.push(Reply::Dbl(member.score));
        n += 2;
        current = set.offset(&member, 1).cloned();
    }

    Reply::Arr(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_ns() -> Namespace {
        Namespace::new()
    }

    #[test]
    fn set_get_del_roundtrip() {
        let mut ns = new_ns();
        assert_eq!(dispatch(&mut ns, &[b"set".to_vec(), b"k".to_vec(), b"v".to_vec()]), Reply::Nil);
        assert_eq!(dispatch(&mut ns, &[b"get".to_vec(), b"k".to_vec()]), Reply::Str(b"v".to_vec()));
        assert_eq!(dispatch(&mut ns, &[b"del".to_vec(), b"k".to_vec()]), Reply::Int(1));
        assert_eq!(dispatch(&mut ns, &[b"get".to_vec(), b"k".to_vec()]), Reply::Nil);
    }

    #[test]
    fn zadd_zscore_zrem_roundtrip() {
        let mut ns = new_ns();
        let zadd_args = |k: &str, s: &str, n: &str| {
            vec![b"zadd".to_vec(), k.as_bytes().to_vec(), s.as_bytes().to_vec(), n.as_bytes().to_vec()]
        };
        assert_eq!(dispatch(&mut ns, &zadd_args("z", "1.0", "a")), Reply::Int(1));
        assert_eq!(dispatch(&mut ns, &zadd_args("z", "1.0", "a")), Reply::Int(0));
        assert_eq!(
            dispatch(&mut ns, &[b"zscore".to_vec(), b"z".to_vec(), b"a".to_vec()]),
            Reply::Dbl(1.0)
        );
        assert_eq!(
            dispatch(&mut ns, &[b"zrem".to_vec(), b"z".to_vec(), b"a".to_vec()]),
            Reply::Int(1)
        );
        assert_eq!(
            dispatch(&mut ns, &[b"zscore".to_vec(), b"z".to_vec(), b"a".to_vec()]),
            Reply::Nil
        );
    }

    #[test]
    fn zquery_walks_tuple_order() {
        let mut ns = new_ns();
        dispatch(&mut ns, &[b"zadd".to_vec(), b"z".to_vec(), b"1".to_vec(), b"a".to_vec()]);
        dispatch(&mut ns, &[b"zadd".to_vec(), b"z".to_vec(), b"2".to_vec(), b"b".to_vec()]);
        dispatch(&mut ns, &[b"zadd".to_vec(), b"z".to_vec(), b"2".to_vec(), b"c".to_vec()]);
        let reply = dispatch(
            &mut ns,
            &[
                b"zquery".to_vec(),
                b"z".to_vec(),
                b"1".to_vec(),
                b"".to_vec(),
                b"0".to_vec(),
                b"10".to_vec(),
            ],
        );
        assert_eq!(
            reply,
            Reply::Arr(vec![
                Reply::Str(b"a".to_vec()),
                Reply::Dbl(1.0),
                Reply::Str(b"b".to_vec()),
                Reply::Dbl(2.0),
                Reply::Str(b"c".to_vec()),
                Reply::Dbl(2.0),
            ])
        );
    }

    #[test]
    fn zquery_on_missing_key_is_empty_array_not_nil() {
        let mut ns = new_ns();
        let reply = dispatch(
            &mut ns,
            &[
                b"zquery".to_vec(),
                b"nope".to_vec(),
                b"0".to_vec(),
                b"".to_vec(),
                b"0".to_vec(),
                b"10".to_vec(),
            ],
        );
        assert_eq!(reply, Reply::Arr(Vec::new()));
    }

    #[test]
    fn set_rejects_type_change_from_sorted_set() {
        let mut ns = new_ns();
        dispatch(&mut ns, &[b"zadd".to_vec(), b"k".to_vec(), b"1".to_vec(), b"a".to_vec()]);
        let reply = dispatch(&mut ns, &[b"set".to_vec(), b"k".to_vec(), b"x".to_vec()]);
        assert_eq!(reply, Reply::err(CommandError::Type));
    }

    #[test]
    fn get_on_sorted_set_key_is_type_error() {
        let mut ns = new_ns();
        dispatch(&mut ns, &[b"set".to_vec(), b"k".to_vec(), b"x".to_vec()]);
        let reply = dispatch(&mut ns, &[b"zscore".to_vec(), b"k".to_vec(), b"x".to_vec()]);
        assert_eq!(reply, Reply::err(CommandError::Type));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut ns = new_ns();
        let reply = dispatch(&mut ns, &[b"nope".to_vec()]);
        assert_eq!(reply, Reply::err(CommandError::Unknown));
    }
}
