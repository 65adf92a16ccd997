/// Game profiles: where each Paradox title keeps its localisation and how it names languages
use crate::backup::BACKUP_DIR_NAME;
use crate::formats::header_for_language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

const LOCALIZATION_EXTENSIONS: [&str; 3] = ["yml", "yaml", "txt"];

const DEFAULT_LANGUAGE_KEYS: [(&str, &str); 10] = [
    ("en", "english"),
    ("fr", "french"),
    ("de", "german"),
    ("es", "spanish"),
    ("pl", "polish"),
    ("pt", "portuguese"),
    ("ru", "russian"),
    ("zh", "chinese"),
    ("kr", "korean"),
    ("jp", "japanese"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameType {
    #[default]
    Generic,
    Stellaris,
    HeartsOfIronIV,
    EuropaUniversalisIV,
    CrusaderKings3,
    Victoria3,
}

impl GameType {
    pub const ALL: [GameType; 6] = [
        GameType::Generic,
        GameType::Stellaris,
        GameType::HeartsOfIronIV,
        GameType::EuropaUniversalisIV,
        GameType::CrusaderKings3,
        GameType::Victoria3,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameProfile {
    pub game: GameType,
    pub id: String,
    pub display_name: String,
    pub localization_folder: String,
    /// Short language code to the game's language name.
    pub language_keys: BTreeMap<String, String>,
    /// Write into an existing language instead of a new one, for titles
    /// that do not load custom languages.
    pub use_override_mode: bool,
    pub override_language: String,
}

impl GameProfile {
    pub fn for_game(game: GameType) -> Self {
        let mut language_keys: BTreeMap<String, String> = DEFAULT_LANGUAGE_KEYS
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect();

        let (id, display_name, folder) = match game {
            GameType::Generic => ("generic", "Generic Paradox Game", "localisation"),
            GameType::Stellaris => ("stellaris", "Stellaris", "localisation"),
            GameType::HeartsOfIronIV => ("hoi4", "Hearts of Iron IV", "localisation"),
            GameType::EuropaUniversalisIV => ("eu4", "Europa Universalis IV", "localisation"),
            GameType::CrusaderKings3 => ("ck3", "Crusader Kings III", "localization"),
            GameType::Victoria3 => ("vic3", "Victoria 3", "localization"),
        };

        if game == GameType::Stellaris {
            language_keys.insert("pt".into(), "braz_por".into());
            language_keys.insert("zh".into(), "simp_chinese".into());
        }

        Self {
            game,
            id: id.to_string(),
            display_name: display_name.to_string(),
            localization_folder: folder.to_string(),
            language_keys,
            use_override_mode: game == GameType::Victoria3,
            override_language: "english".to_string(),
        }
    }

    /// Game language name for a short code; unknown codes pass through lowercased.
    pub fn resolve_language(&self, code: &str) -> String {
        let code = code.trim().to_lowercase();
        self.language_keys.get(&code).cloned().unwrap_or(code)
    }

    /// Language the translated file is written as.
    pub fn output_language(&self, target_code: &str) -> String {
        if self.use_override_mode {
            self.override_language.clone()
        } else {
            self.resolve_language(target_code)
        }
    }

    pub fn header_for(&self, target_code: &str) -> String {
        header_for_language(&self.output_language(target_code))
    }

    /// `events_l_english.yml` becomes `events_l_<target>.yml`; names without a
    /// language suffix get one.
    pub fn localized_file_name(&self, file_name: &str, source_code: &str, target_code: &str) -> String {
        let source = self.resolve_language(source_code);
        let target = self.output_language(target_code);
        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (file_name, None),
        };

        let suffix = format!("_l_{source}");
        let base = stem.strip_suffix(suffix.as_str()).unwrap_or(stem);
        match extension {
            Some(ext) => format!("{base}_l_{target}.{ext}"),
            None => format!("{base}_l_{target}"),
        }
    }

    /// Output location for a translated copy of `input`: a folder named after
    /// the source language is swapped for the target, and the file is renamed.
    pub fn output_path(&self, input: &Path, source_code: &str, target_code: &str) -> PathBuf {
        let source = self.resolve_language(source_code);
        let target = self.output_language(target_code);

        let mut output = PathBuf::new();
        if let Some(parent) = input.parent() {
            for component in parent.components() {
                match component {
                    Component::Normal(name) if name.to_string_lossy().eq_ignore_ascii_case(&source) => {
                        output.push(&target)
                    }
                    other => output.push(other.as_os_str()),
                }
            }
        }

        let file_name = input
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("localization.yml");
        output.push(self.localized_file_name(file_name, source_code, target_code));
        output
    }
}

pub fn list_profiles() -> Vec<GameProfile> {
    GameType::ALL.iter().copied().map(GameProfile::for_game).collect()
}

/// Every `.yml`, `.yaml` and `.txt` below `root`, sorted. Backup folders are skipped.
pub fn find_localization_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(root, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if path.file_name() != Some(OsStr::new(BACKUP_DIR_NAME)) {
                collect_files(&path, files)?;
            }
            continue;
        }
        let is_localization = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|ext| {
                LOCALIZATION_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);
        if is_localization {
            files.push(path);
        }
    }
    Ok(())
}
