//! Language detection collaborator.
//!
//! The engine attributes file touches to languages through the
//! [`LanguageDetector`] trait so callers can plug in a richer detector (e.g.
//! one backed by a full linguist database). The default implementation maps
//! file extensions and a few well-known filenames through a static table.

/// Path-to-language mapping consumed by competency attribution.
pub trait LanguageDetector: Send + Sync {
   /// Map a repository-relative path to a language label, if known.
   fn detect_from_path(&self, path: &str) -> Option<String>;

   /// Whether a label counts as a programming language (markup, data, and
   /// prose labels are excluded from competency).
   fn is_programming(&self, label: &str) -> bool;
}

/// (extension, language, is_programming)
const EXT_LANGUAGES: &[(&str, &str, bool)] = &[
   ("rs", "Rust", true),
   ("go", "Go", true),
   ("py", "Python", true),
   ("pyi", "Python", true),
   ("js", "JavaScript", true),
   ("mjs", "JavaScript", true),
   ("jsx", "JavaScript", true),
   ("ts", "TypeScript", true),
   ("tsx", "TypeScript", true),
   ("java", "Java", true),
   ("kt", "Kotlin", true),
   ("kts", "Kotlin", true),
   ("c", "C", true),
   ("h", "C", true),
   ("cc", "C++", true),
   ("cpp", "C++", true),
   ("cxx", "C++", true),
   ("hpp", "C++", true),
   ("hh", "C++", true),
   ("cs", "C#", true),
   ("rb", "Ruby", true),
   ("php", "PHP", true),
   ("swift", "Swift", true),
   ("scala", "Scala", true),
   ("m", "Objective-C", true),
   ("mm", "Objective-C", true),
   ("ex", "Elixir", true),
   ("exs", "Elixir", true),
   ("erl", "Erlang", true),
   ("hs", "Haskell", true),
   ("lua", "Lua", true),
   ("r", "R", true),
   ("pl", "Perl", true),
   ("sh", "Shell", true),
   ("bash", "Shell", true),
   ("zsh", "Shell", true),
   ("fish", "Shell", true),
   ("ps1", "PowerShell", true),
   ("sql", "SQL", true),
   ("dart", "Dart", true),
   ("zig", "Zig", true),
   ("vue", "Vue", true),
   ("svelte", "Svelte", true),
   // Markup / styling
   ("html", "HTML", false),
   ("htm", "HTML", false),
   ("css", "CSS", false),
   ("scss", "CSS", false),
   ("less", "CSS", false),
   // Data / config
   ("json", "JSON", false),
   ("yaml", "YAML", false),
   ("yml", "YAML", false),
   ("toml", "TOML", false),
   ("xml", "XML", false),
   ("ini", "INI", false),
   ("proto", "Protobuf", false),
   // Prose
   ("md", "Markdown", false),
   ("rst", "reStructuredText", false),
   ("txt", "Text", false),
];

/// Extensionless filenames with a well-known language.
const FILENAME_LANGUAGES: &[(&str, &str, bool)] = &[
   ("Dockerfile", "Dockerfile", false),
   ("Makefile", "Makefile", true),
   ("Justfile", "Just", true),
   ("Rakefile", "Ruby", true),
   ("Gemfile", "Ruby", true),
];

/// Extension-table detector used when the caller supplies nothing richer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionLanguages;

impl ExtensionLanguages {
   fn entry(path: &str) -> Option<(&'static str, bool)> {
      let filename = path.rsplit('/').next().unwrap_or(path);
      for (name, lang, programming) in FILENAME_LANGUAGES {
         if filename == *name {
            return Some((lang, *programming));
         }
      }
      let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
      EXT_LANGUAGES
         .iter()
         .find(|(e, _, _)| *e == ext)
         .map(|(_, lang, programming)| (*lang, *programming))
   }
}

impl LanguageDetector for ExtensionLanguages {
   fn detect_from_path(&self, path: &str) -> Option<String> {
      Self::entry(path).map(|(lang, _)| lang.to_string())
   }

   fn is_programming(&self, label: &str) -> bool {
      EXT_LANGUAGES
         .iter()
         .any(|(_, lang, programming)| *lang == label && *programming)
         || FILENAME_LANGUAGES
            .iter()
            .any(|(_, lang, programming)| *lang == label && *programming)
   }
}
