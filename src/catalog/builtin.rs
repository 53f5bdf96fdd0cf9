//! Built-in source table
//!
//! Order matters: it is the catalog's declaration order, which is also the
//! order new sources receive sort keys during reconciliation. Append new
//! sources at the end of the remote block.

use super::{ContentType, SourceInfo, SourceKind};

pub static BUILTIN_SOURCES: &[SourceInfo] = &[
    SourceInfo::special("LOCAL", "Local storage", SourceKind::Local),
    SourceInfo::remote("MANGADEX", "MangaDex", None, ContentType::Manga),
    SourceInfo::remote("MANGAPARK", "MangaPark", Some("en"), ContentType::Manga),
    SourceInfo::remote("BATOTO", "Bato.To", None, ContentType::Manga),
    SourceInfo::remote("COMICK_FUN", "ComicK", None, ContentType::Manga),
    SourceInfo::remote("MANGAKAKALOT", "Mangakakalot", Some("en"), ContentType::Manga),
    SourceInfo::remote("MANGANATO", "Manganato", Some("en"), ContentType::Manga),
    SourceInfo::remote("MANGAHERE", "MangaHere", Some("en"), ContentType::Manga).broken(),
    SourceInfo::remote("WEBTOONS", "Webtoons", Some("en"), ContentType::Manhwa),
    SourceInfo::remote("ASURASCANS", "Asura Scans", Some("en"), ContentType::Manhwa),
    SourceInfo::remote("MANHUAPLUS", "ManhuaPlus", Some("en"), ContentType::Manhua),
    SourceInfo::remote("COMICEXTRA", "ComicExtra", Some("en"), ContentType::Comics),
    SourceInfo::remote("NOVELFULL", "NovelFull", Some("en"), ContentType::Novel),
    SourceInfo::remote("READMANGA_RU", "ReadManga", Some("ru"), ContentType::Manga),
    SourceInfo::remote("MANGALIB", "MangaLib", Some("ru"), ContentType::Manga),
    SourceInfo::remote("REMANGA", "Remanga", Some("ru"), ContentType::Manhwa),
    SourceInfo::remote("LELSCANVF", "Lelscan-VF", Some("fr"), ContentType::Manga).broken(),
    SourceInfo::remote("TUMANGAONLINE", "TuMangaOnline", Some("es"), ContentType::Manga),
    SourceInfo::remote("RAWKUMA", "Rawkuma", Some("ja"), ContentType::Manga),
    SourceInfo::remote("NHENTAI", "NHentai", None, ContentType::Hentai),
    SourceInfo::remote("HENTAI2READ", "Hentai2Read", Some("en"), ContentType::Hentai),
    SourceInfo::remote("TOONILY", "Toonily", Some("en"), ContentType::Manhwa).nsfw(),
    SourceInfo::special("UNKNOWN", "Unknown", SourceKind::Unknown),
    SourceInfo::special("DUMMY", "Dummy", SourceKind::Debug),
];
