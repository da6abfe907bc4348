use crate::game::character::AnimSet;
use crate::game::chart::{Chart, Difficulty};
use crate::game::parsing::blob::{self, BLOB_VERSION, ChartBlob};
use crate::game::parsing::fnf;
use crate::game::stage::StageRigs;
use bincode::{Decode, Encode};
use log::{debug, error, info, warn};
use rustc_hash::FxHashMap;
use std::{fs, path::Path, sync::Arc};

// --- Resource names ---

const FNV_OFFSET: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

const PACKAGE_VERSION: u32 = 1;

pub const BF_RIG: &str = "\\CHAR\\BF.ANM";
pub const DAD_RIG: &str = "\\CHAR\\DAD.ANM";
pub const GF_RIG: &str = "\\CHAR\\GF.ANM";

/// FNV-1a over the name bytes. Names are matched exactly, case included.
pub const fn name_hash(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut hash = FNV_OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

#[inline(always)]
fn difficulty_suffix(difficulty: Difficulty) -> char {
    match difficulty {
        Difficulty::Easy => 'E',
        Difficulty::Normal => 'N',
        Difficulty::Hard => 'H',
    }
}

pub fn chart_name(song: &str, difficulty: Difficulty) -> String {
    format!("\\SONGS\\{}{}.CHT", song.to_ascii_uppercase(), difficulty_suffix(difficulty))
}

// --- Package ---

#[derive(Clone, Debug, Encode, Decode)]
struct PackageEntry {
    hash: u32,
    data: Vec<u8>,
}

#[derive(Encode, Decode)]
struct PackageFile {
    version: u32,
    entries: Vec<PackageEntry>,
}

/// Flat archive of named blobs, looked up by name hash.
#[derive(Debug, Default)]
pub struct Package {
    entries: Vec<PackageEntry>,
    index: FxHashMap<u32, usize>,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let (file, _) =
            bincode::decode_from_slice::<PackageFile, _>(bytes, bincode::config::standard())
                .map_err(|e| format!("Failed to decode package: {e}"))?;
        if file.version != PACKAGE_VERSION {
            return Err(format!(
                "Package version {} (expected {PACKAGE_VERSION})",
                file.version
            ));
        }
        let mut package = Self::new();
        for entry in file.entries {
            package.insert_hashed(entry.hash, entry.data);
        }
        Ok(package)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        let file = PackageFile {
            version: PACKAGE_VERSION,
            entries: self.entries.clone(),
        };
        bincode::encode_to_vec(&file, bincode::config::standard())
            .map_err(|e| format!("Failed to encode package: {e}"))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let bytes = fs::read(path)
            .map_err(|e| format!("Failed to read package '{}': {e}", path.display()))?;
        let package = Self::from_bytes(&bytes)?;
        if package.is_empty() {
            warn!("Package '{}' holds no resources.", path.display());
        } else {
            info!("Loaded package '{}' ({} entries).", path.display(), package.len());
        }
        Ok(package)
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let bytes = self.to_bytes()?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create '{}': {e}", dir.display()))?;
        }
        fs::write(path, bytes)
            .map_err(|e| format!("Failed to write package '{}': {e}", path.display()))?;
        info!("Saved package '{}' ({} entries).", path.display(), self.len());
        Ok(())
    }

    #[inline(always)]
    pub fn search(&self, name: &str) -> Option<&[u8]> {
        self.index
            .get(&name_hash(name))
            .map(|&i| self.entries[i].data.as_slice())
    }

    /// Adds or replaces a resource.
    pub fn insert(&mut self, name: &str, data: Vec<u8>) {
        debug!("Package insert {name} ({} bytes)", data.len());
        self.insert_hashed(name_hash(name), data);
    }

    fn insert_hashed(&mut self, hash: u32, data: Vec<u8>) {
        if let Some(&i) = self.index.get(&hash) {
            self.entries[i].data = data;
        } else {
            self.index.insert(hash, self.entries.len());
            self.entries.push(PackageEntry { hash, data });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fatal lookup. A missing resource means a broken install, so this logs and
/// exits with a failure status.
pub fn require<'a>(package: &'a Package, name: &str) -> &'a [u8] {
    match package.search(name) {
        Some(data) => data,
        None => {
            error!("Required resource {name} ({:#010x}) is missing.", name_hash(name));
            std::process::exit(1);
        }
    }
}

// --- Charts ---

pub fn load_chart(package: &Package, song: &str, difficulty: Difficulty) -> Result<Chart, String> {
    let name = chart_name(song, difficulty);
    let chart = blob::decode_chart(require(package, &name))
        .map_err(|e| format!("Chart {name}: {e}"))?;
    info!(
        "Loaded chart {name}: {} sections, {} notes.",
        chart.sections.len(),
        chart.notes.len()
    );
    Ok(chart)
}

fn cached_hash(package: &Package, name: &str) -> Option<u64> {
    let bytes = package.search(name)?;
    match ChartBlob::decode(bytes) {
        Ok(b) if b.version == BLOB_VERSION => Some(b.source_hash),
        Ok(b) => {
            info!("Chart {name} stale (blob version {}).", b.version);
            None
        }
        Err(e) => {
            warn!("Chart {name} unreadable, rebuilding: {e}");
            None
        }
    }
}

/// Compiles `source` into the package unless every difficulty already holds
/// a blob built from the same source. Returns how many blobs were written.
pub fn sync_charts(package: &mut Package, song: &str, source: &[u8]) -> Result<usize, String> {
    let hash = blob::source_hash(source);
    let fresh = Difficulty::ALL
        .iter()
        .all(|&d| cached_hash(package, &chart_name(song, d)) == Some(hash));
    if fresh {
        info!("Chart cache hit for {song}.");
        return Ok(0);
    }

    info!("Chart cache miss for {song}, compiling.");
    let text = std::str::from_utf8(source).map_err(|e| format!("Chart source is not UTF-8: {e}"))?;
    let charts = fnf::compile(text)?;
    let mut written = 0;
    for difficulty in Difficulty::ALL {
        let Some(chart) = fnf::select(charts.clone(), difficulty) else {
            continue;
        };
        let bytes = ChartBlob::from_chart(&chart, hash).encode()?;
        package.insert(&chart_name(song, difficulty), bytes);
        written += 1;
    }
    Ok(written)
}

// --- Rigs ---

pub fn store_rigs(package: &mut Package, rigs: &StageRigs) -> Result<(), String> {
    package.insert(BF_RIG, rigs.bf.to_bytes()?);
    package.insert(DAD_RIG, rigs.dad.to_bytes()?);
    package.insert(GF_RIG, rigs.gf.to_bytes()?);
    Ok(())
}

fn load_rig(package: &Package, name: &str, fallback: &Arc<AnimSet>) -> Arc<AnimSet> {
    match package.search(name).map(AnimSet::from_bytes) {
        Some(Ok(set)) => Arc::new(set),
        Some(Err(e)) => {
            warn!("Rig {name}: {e}. Using placeholder.");
            fallback.clone()
        }
        None => {
            warn!("Rig {name} not in package. Using placeholder.");
            fallback.clone()
        }
    }
}

/// Character rigs, with evenly timed stand-ins for any that are absent.
pub fn load_rigs(package: &Package) -> StageRigs {
    let fallback = StageRigs::placeholder();
    StageRigs {
        bf: load_rig(package, BF_RIG, &fallback.bf),
        dad: load_rig(package, DAD_RIG, &fallback.dad),
        gf: load_rig(package, GF_RIG, &fallback.gf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONG: &str = r#"{"song":{"bpm":120,"speed":[1.0,1.0,1.0],"notes":[
        [{"mustHitSection":true,"sectionNotes":[[500,0,0]]}],
        [{"mustHitSection":true,"sectionNotes":[[500,1,0]]}],
        [{"mustHitSection":true,"sectionNotes":[[500,2,0]]}]
    ]}}"#;

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(name_hash(""), 0x811C_9DC5);
        assert_eq!(name_hash("a"), 0xE40C_292C);
        assert_ne!(name_hash(BF_RIG), name_hash(DAD_RIG));
    }

    #[test]
    fn package_insert_replace_and_round_trip() {
        let mut package = Package::new();
        package.insert("\\A.BIN", vec![1, 2, 3]);
        package.insert("\\B.BIN", vec![4]);
        package.insert("\\A.BIN", vec![9]);
        assert_eq!(package.len(), 2);
        assert_eq!(package.search("\\A.BIN"), Some(&[9u8][..]));
        assert!(package.search("\\a.bin").is_none());

        let copy = Package::from_bytes(&package.to_bytes().expect("encode")).expect("decode");
        assert_eq!(copy.search("\\B.BIN"), Some(&[4u8][..]));
    }

    #[test]
    fn charts_sync_once_per_source() {
        let mut package = Package::new();
        assert_eq!(sync_charts(&mut package, "bopeebo", SONG.as_bytes()).expect("sync"), 3);
        assert_eq!(sync_charts(&mut package, "bopeebo", SONG.as_bytes()).expect("sync"), 0);

        let edited = SONG.replace("[500,2,0]", "[750,2,0]");
        assert_eq!(sync_charts(&mut package, "bopeebo", edited.as_bytes()).expect("sync"), 3);

        let normal = load_chart(&package, "bopeebo", Difficulty::Normal).expect("chart");
        assert_eq!(normal.notes[0].time, crate::core::fixed::Fixed::from_f64(0.75));
    }

    #[test]
    fn missing_rigs_fall_back() {
        let mut package = Package::new();
        let rigs = StageRigs {
            bf: Arc::new(AnimSet::uniform(3)),
            ..StageRigs::placeholder()
        };
        store_rigs(&mut package, &rigs).expect("store");
        let loaded = load_rigs(&package);
        assert_eq!(loaded.bf.animations.len(), 3);
        assert_eq!(load_rigs(&Package::new()).bf.animations.len(), 10);
    }
}
