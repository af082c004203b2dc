//! LMDB-backed entity store
//!
//! Layout (one named database each):
//! - `permissions` / `groups`: `id:8` -> `[guard][name]`
//! - `permission_names` / `group_names`: `[guard][name]` -> id
//! - `group_permissions`: `group_id:8 permission_id:8` -> ()
//! - `principal_groups` / `principal_permissions`: `[type] id:8 target:8` -> ()
//! - `meta`: counters
//!
//! Every write runs in its own write transaction; LMDB serializes writers.

use std::path::Path;

use heed::types::{Bytes, Str, Unit, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use crate::constants::{LMDB_MAP_SIZE, LMDB_MAX_DBS};
use crate::error::{err, Error, Result};
use crate::keys::{association_key, name_key, parse_association, parse_name, principal_prefix, principal_type_prefix};
use crate::model::{Group, Permission, PrincipalKey};
use crate::store::{Associations, EntityStore};

type BeU64 = U64<byteorder::BigEndian>;
type Rows = Database<Bytes, Bytes>;
type Names = Database<Bytes, BeU64>;
type Links = Database<Bytes, Unit>;

const NEXT_ID: &str = "next_id";

/// Create a 16-byte key from two u64 values
#[inline]
fn key(a: u64, b: u64) -> [u8; 16] {
    let mut k = [0u8; 16];
    k[..8].copy_from_slice(&a.to_be_bytes());
    k[8..].copy_from_slice(&b.to_be_bytes());
    k
}

fn split_pair(k: &[u8]) -> Option<(u64, u64)> {
    if k.len() != 16 {
        return None;
    }
    Some((
        u64::from_be_bytes(k[..8].try_into().ok()?),
        u64::from_be_bytes(k[8..].try_into().ok()?),
    ))
}

fn corrupt(what: &str) -> Error {
    Error::Storage(format!("corrupted {} record", what))
}

/// Rows plus their unique `(guard, name)` index, kept in sync
struct Table {
    rows: Rows,
    names: Names,
    what: &'static str,
}

enum Renamed {
    Done { guard: String },
    Missing,
    Taken { guard: String },
}

impl Table {
    fn find(&self, tx: &RoTxn, name: &str, guard: &str) -> Result<Option<u64>> {
        self.names.get(tx, &name_key(guard, name)?).map_err(err)
    }

    /// `(guard, name)` of a row
    fn get(&self, tx: &RoTxn, id: u64) -> Result<Option<(String, String)>> {
        match self.rows.get(tx, &id.to_be_bytes()).map_err(err)? {
            Some(raw) => {
                let (guard, name) = parse_name(raw).ok_or_else(|| corrupt(self.what))?;
                Ok(Some((guard.to_string(), name.to_string())))
            }
            None => Ok(None),
        }
    }

    fn find_by_id(&self, tx: &RoTxn, id: u64, guard: &str) -> Result<Option<String>> {
        Ok(self.get(tx, id)?.filter(|(g, _)| g == guard).map(|(_, name)| name))
    }

    /// Returns `None` when `(name, guard)` is taken
    fn create(&self, tx: &mut RwTxn, meta: &Database<Str, BeU64>, name: &str, guard: &str) -> Result<Option<u64>> {
        let nk = name_key(guard, name)?;
        if self.names.get(tx, &nk).map_err(err)?.is_some() {
            return Ok(None);
        }
        let id = meta.get(tx, NEXT_ID).map_err(err)?.unwrap_or(1);
        meta.put(tx, NEXT_ID, &(id + 1)).map_err(err)?;
        self.rows.put(tx, &id.to_be_bytes(), &nk).map_err(err)?;
        self.names.put(tx, &nk, &id).map_err(err)?;
        Ok(Some(id))
    }

    fn rename(&self, tx: &mut RwTxn, id: u64, new_name: &str) -> Result<Renamed> {
        let Some((guard, old)) = self.get(tx, id)? else {
            return Ok(Renamed::Missing);
        };
        let nk = name_key(&guard, new_name)?;
        match self.names.get(tx, &nk).map_err(err)? {
            Some(other) if other != id => return Ok(Renamed::Taken { guard }),
            _ => {}
        }
        self.names.delete(tx, &name_key(&guard, &old)?).map_err(err)?;
        self.rows.put(tx, &id.to_be_bytes(), &nk).map_err(err)?;
        self.names.put(tx, &nk, &id).map_err(err)?;
        Ok(Renamed::Done { guard })
    }

    /// Every row as `(id, guard, name)`, by id
    fn all(&self, tx: &RoTxn) -> Result<Vec<(u64, String, String)>> {
        let mut r = Vec::new();
        for item in self.rows.iter(tx).map_err(err)? {
            let (k, v) = item.map_err(err)?;
            let id = u64::from_be_bytes(k.try_into().map_err(|_| corrupt(self.what))?);
            let (guard, name) = parse_name(v).ok_or_else(|| corrupt(self.what))?;
            r.push((id, guard.to_string(), name.to_string()));
        }
        Ok(r)
    }
}

/// All database handles
struct Dbs {
    permissions: Table,
    groups: Table,
    group_permissions: Links,
    principal_groups: Links,
    principal_permissions: Links,
    meta: Database<Str, BeU64>,
}

fn collect_keys(tx: &RoTxn, db: &Links, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut keys = Vec::new();
    for item in db.prefix_iter(tx, prefix).map_err(err)? {
        let (k, _) = item.map_err(err)?;
        keys.push(k.to_vec());
    }
    Ok(keys)
}

fn linked_ids(tx: &RoTxn, db: &Links, p: &PrincipalKey) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    for k in collect_keys(tx, db, &principal_prefix(&p.principal_type, p.id)?)? {
        let (_, _, target) = parse_association(&k).ok_or_else(|| corrupt("association"))?;
        ids.push(target);
    }
    Ok(ids)
}

fn sync_links(tx: &mut RwTxn, db: &Links, p: &PrincipalKey, ids: &[u64], detach_others: bool) -> Result<()> {
    if detach_others {
        clear_links(tx, db, p)?;
    }
    for id in ids {
        db.put(tx, &association_key(&p.principal_type, p.id, *id)?, &()).map_err(err)?;
    }
    Ok(())
}

fn detach_links(tx: &mut RwTxn, db: &Links, p: &PrincipalKey, ids: &[u64]) -> Result<()> {
    for id in ids {
        db.delete(tx, &association_key(&p.principal_type, p.id, *id)?).map_err(err)?;
    }
    Ok(())
}

fn clear_links(tx: &mut RwTxn, db: &Links, p: &PrincipalKey) -> Result<()> {
    for k in collect_keys(tx, db, &principal_prefix(&p.principal_type, p.id)?)? {
        db.delete(tx, &k).map_err(err)?;
    }
    Ok(())
}

pub struct LmdbStore {
    env: Env,
    dbs: Dbs,
}

impl LmdbStore {
    /// Open (or create) a store rooted at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(err)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(LMDB_MAP_SIZE)
                .max_dbs(LMDB_MAX_DBS)
                .open(path)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let dbs = Dbs {
            permissions: Table {
                rows: env.create_database(&mut tx, Some("permissions")).map_err(err)?,
                names: env.create_database(&mut tx, Some("permission_names")).map_err(err)?,
                what: "permission",
            },
            groups: Table {
                rows: env.create_database(&mut tx, Some("groups")).map_err(err)?,
                names: env.create_database(&mut tx, Some("group_names")).map_err(err)?,
                what: "group",
            },
            group_permissions: env.create_database(&mut tx, Some("group_permissions")).map_err(err)?,
            principal_groups: env.create_database(&mut tx, Some("principal_groups")).map_err(err)?,
            principal_permissions: env.create_database(&mut tx, Some("principal_permissions")).map_err(err)?,
            meta: env.create_database(&mut tx, Some("meta")).map_err(err)?,
        };
        tx.commit().map_err(err)?;
        tracing::debug!(path = %path.display(), "opened lmdb entity store");
        Ok(LmdbStore { env, dbs })
    }

    /// Execute a read-only operation
    fn read<T, F: FnOnce(&Dbs, &RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        f(&self.dbs, &self.env.read_txn().map_err(err)?)
    }

    /// Run a write in one transaction; nothing is committed if `f` fails
    fn write<T, F: FnOnce(&Dbs, &mut RwTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let mut tx = self.env.write_txn().map_err(err)?;
        let r = f(&self.dbs, &mut tx)?;
        tx.commit().map_err(err)?;
        Ok(r)
    }
}

impl EntityStore for LmdbStore {
    fn find_permission(&self, name: &str, guard: &str) -> Result<Option<Permission>> {
        self.read(|d, tx| {
            Ok(d.permissions.find(tx, name, guard)?.map(|id| Permission {
                id,
                name: name.to_string(),
                guard_name: guard.to_string(),
            }))
        })
    }

    fn find_permission_by_id(&self, id: u64, guard: &str) -> Result<Option<Permission>> {
        self.read(|d, tx| {
            Ok(d.permissions.find_by_id(tx, id, guard)?.map(|name| Permission {
                id,
                name,
                guard_name: guard.to_string(),
            }))
        })
    }

    fn create_permission(&self, name: &str, guard: &str) -> Result<Permission> {
        self.write(|d, tx| match d.permissions.create(tx, &d.meta, name, guard)? {
            Some(id) => Ok(Permission { id, name: name.into(), guard_name: guard.into() }),
            None => Err(Error::PermissionAlreadyExists { name: name.into(), guard: guard.into() }),
        })
    }

    fn rename_permission(&self, id: u64, new_name: &str) -> Result<Permission> {
        self.write(|d, tx| match d.permissions.rename(tx, id, new_name)? {
            Renamed::Done { guard } => Ok(Permission { id, name: new_name.into(), guard_name: guard }),
            Renamed::Taken { guard } => Err(Error::PermissionAlreadyExists { name: new_name.into(), guard }),
            Renamed::Missing => Err(Error::Storage(format!("permission {} does not exist", id))),
        })
    }

    fn find_group(&self, name: &str, guard: &str) -> Result<Option<Group>> {
        self.read(|d, tx| {
            Ok(d.groups.find(tx, name, guard)?.map(|id| Group {
                id,
                name: name.to_string(),
                guard_name: guard.to_string(),
            }))
        })
    }

    fn find_group_by_id(&self, id: u64, guard: &str) -> Result<Option<Group>> {
        self.read(|d, tx| {
            Ok(d.groups.find_by_id(tx, id, guard)?.map(|name| Group {
                id,
                name,
                guard_name: guard.to_string(),
            }))
        })
    }

    fn create_group(&self, name: &str, guard: &str) -> Result<Group> {
        self.write(|d, tx| match d.groups.create(tx, &d.meta, name, guard)? {
            Some(id) => Ok(Group { id, name: name.into(), guard_name: guard.into() }),
            None => Err(Error::GroupAlreadyExists { name: name.into(), guard: guard.into() }),
        })
    }

    fn rename_group(&self, id: u64, new_name: &str) -> Result<Group> {
        self.write(|d, tx| match d.groups.rename(tx, id, new_name)? {
            Renamed::Done { guard } => Ok(Group { id, name: new_name.into(), guard_name: guard }),
            Renamed::Taken { guard } => Err(Error::GroupAlreadyExists { name: new_name.into(), guard }),
            Renamed::Missing => Err(Error::Storage(format!("group {} does not exist", id))),
        })
    }

    fn all_permissions(&self) -> Result<Vec<Permission>> {
        self.read(|d, tx| {
            Ok(d.permissions
                .all(tx)?
                .into_iter()
                .map(|(id, guard_name, name)| Permission { id, name, guard_name })
                .collect())
        })
    }

    fn all_groups(&self) -> Result<Vec<Group>> {
        self.read(|d, tx| {
            Ok(d.groups
                .all(tx)?
                .into_iter()
                .map(|(id, guard_name, name)| Group { id, name, guard_name })
                .collect())
        })
    }

    fn all_group_permissions(&self) -> Result<Vec<(u64, u64)>> {
        self.read(|d, tx| {
            let mut r = Vec::new();
            for item in d.group_permissions.iter(tx).map_err(err)? {
                let (k, _) = item.map_err(err)?;
                r.push(split_pair(k).ok_or_else(|| corrupt("group permission"))?);
            }
            Ok(r)
        })
    }

    fn list_associations(&self, principal: &PrincipalKey) -> Result<Associations> {
        self.read(|d, tx| {
            Ok(Associations {
                group_ids: linked_ids(tx, &d.principal_groups, principal)?,
                permission_ids: linked_ids(tx, &d.principal_permissions, principal)?,
            })
        })
    }

    fn sync_principal_groups(&self, principal: &PrincipalKey, group_ids: &[u64], detach_others: bool) -> Result<()> {
        self.write(|d, tx| sync_links(tx, &d.principal_groups, principal, group_ids, detach_others))
    }

    fn detach_principal_groups(&self, principal: &PrincipalKey, group_ids: &[u64]) -> Result<()> {
        self.write(|d, tx| detach_links(tx, &d.principal_groups, principal, group_ids))
    }

    fn sync_principal_permissions(&self, principal: &PrincipalKey, permission_ids: &[u64], detach_others: bool) -> Result<()> {
        self.write(|d, tx| sync_links(tx, &d.principal_permissions, principal, permission_ids, detach_others))
    }

    fn detach_principal_permissions(&self, principal: &PrincipalKey, permission_ids: &[u64]) -> Result<()> {
        self.write(|d, tx| detach_links(tx, &d.principal_permissions, principal, permission_ids))
    }

    fn sync_group_permissions(&self, group_id: u64, permission_ids: &[u64], detach_others: bool) -> Result<()> {
        self.write(|d, tx| {
            if detach_others {
                for k in collect_keys(tx, &d.group_permissions, &group_id.to_be_bytes())? {
                    d.group_permissions.delete(tx, &k).map_err(err)?;
                }
            }
            for p in permission_ids {
                d.group_permissions.put(tx, &key(group_id, *p), &()).map_err(err)?;
            }
            Ok(())
        })
    }

    fn detach_group_permissions(&self, group_id: u64, permission_ids: &[u64]) -> Result<()> {
        self.write(|d, tx| {
            for p in permission_ids {
                d.group_permissions.delete(tx, &key(group_id, *p)).map_err(err)?;
            }
            Ok(())
        })
    }

    fn principals_with_groups(&self, principal_type: &str, group_ids: &[u64]) -> Result<Vec<u64>> {
        self.read(|d, tx| {
            let mut ids: Vec<u64> = Vec::new();
            for k in collect_keys(tx, &d.principal_groups, &principal_type_prefix(principal_type)?)? {
                let (_, id, group) = parse_association(&k).ok_or_else(|| corrupt("association"))?;
                if group_ids.contains(&group) && ids.last() != Some(&id) {
                    ids.push(id);
                }
            }
            Ok(ids)
        })
    }

    fn on_principal_hard_delete(&self, principal: &PrincipalKey) -> Result<()> {
        self.write(|d, tx| {
            clear_links(tx, &d.principal_groups, principal)?;
            clear_links(tx, &d.principal_permissions, principal)
        })
    }
}
