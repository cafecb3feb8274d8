use anyhow::{Context, Result};
use rand::{seq::SliceRandom, Rng};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Clips `.mp3` disponibles en el directorio de audio.
#[derive(Debug, Clone)]
pub struct ClipLibrary {
    dir: PathBuf,
    clips: Vec<PathBuf>,
}

impl ClipLibrary {
    /// Lee el directorio una sola vez; los archivos añadidos después no se ven.
    pub async fn scan(dir: &Path) -> Result<Self> {
        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("No se pudo leer el directorio de audio {}", dir.display()))?;
        let mut clips = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_mp3 = path
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("mp3"));

            if is_mp3 && entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                clips.push(path);
            }
        }
        clips.sort();

        if clips.is_empty() {
            warn!("⚠️ No hay clips .mp3 en {}", dir.display());
        } else {
            info!("📂 {} clips cargados desde {}", clips.len(), dir.display());
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            clips,
        })
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Path> {
        self.clips.choose(rng).map(PathBuf::as_path)
    }

    /// Ruta de un archivo concreto del directorio, exista o no.
    pub fn named(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }
}
