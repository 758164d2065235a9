//! Declarative candidate lists: which engines each operation tries, in what
//! order, with which arguments and acceptance policy.
//!
//! Argument templates use `{name}` placeholders filled in per attempt:
//!
//! | Placeholder  | Value |
//! |--------------|-------|
//! | `{input}`    | first input file |
//! | `{inputs}`   | every input file, one argument each (whole-argument only) |
//! | `{output}`   | the attempt's output file |
//! | `{outdir}`   | the attempt directory |
//! | `{pages}`    | page ranges with whitespace removed |
//! | `{password}` | encryption password |
//!
//! Substitution is a single left-to-right pass, so a value that itself
//! contains `{…}` is never expanded again.

use crate::config::Engine;
use std::time::Duration;

const GS_TIMEOUT: Duration = Duration::from_secs(60);
const SHORT_TIMEOUT: Duration = Duration::from_secs(30);
const CONVERT_TIMEOUT: Duration = Duration::from_secs(120);

/// Word export filter understood by LibreOffice.
const DOCX_FILTER: &str = "docx:MS Word 2007 XML";

/// When an artifact counts as a result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acceptance {
    /// Any non-empty artifact.
    FirstArtifact,
    /// Size reduction of at least this many percent.
    MinReduction(f64),
    /// Any artifact not larger than the input.
    NotLarger,
    /// Any output file, even an empty one.
    AnyOutput,
}

/// Where the engine leaves its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// A file with this name inside the attempt directory.
    File(String),
    /// The captured standard output.
    Stdout,
}

/// One way of carrying out an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineCandidate {
    /// Reported name, e.g. `ghostscript-aggressive`.
    pub name: String,
    pub engine: Engine,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub acceptance: Acceptance,
    pub output: OutputTarget,
    /// Further calls of the same program, run in order in the attempt
    /// directory once `args` succeeded.
    pub then: Vec<Vec<String>>,
}

impl EngineCandidate {
    fn new(name: &str, engine: Engine, args: &[&str], timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            engine,
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout,
            acceptance: Acceptance::FirstArtifact,
            output: OutputTarget::File("output.pdf".to_string()),
            then: Vec::new(),
        }
    }

    fn accept(mut self, acceptance: Acceptance) -> Self {
        self.acceptance = acceptance;
        self
    }

    fn output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    fn then(mut self, args: &[&str]) -> Self {
        self.then.push(args.iter().map(|a| a.to_string()).collect());
        self
    }
}

// ── Compress ─────────────────────────────────────────────────────────────

/// A Ghostscript `pdfwrite` compression profile.
struct GsProfile {
    name: &'static str,
    compatibility: &'static str,
    settings: &'static str,
    jpeg_quality: u8,
    resolution: u16,
    mono_resolution: u16,
    acceptance: Acceptance,
}

const GS_PROFILES: [GsProfile; 3] = [
    GsProfile {
        name: "balanced",
        compatibility: "1.6",
        settings: "/ebook",
        jpeg_quality: 70,
        resolution: 150,
        mono_resolution: 300,
        acceptance: Acceptance::MinReduction(20.0),
    },
    GsProfile {
        name: "aggressive",
        compatibility: "1.5",
        settings: "/screen",
        jpeg_quality: 50,
        resolution: 100,
        mono_resolution: 200,
        acceptance: Acceptance::MinReduction(20.0),
    },
    GsProfile {
        name: "ultra",
        compatibility: "1.4",
        settings: "/screen",
        jpeg_quality: 30,
        resolution: 72,
        mono_resolution: 150,
        acceptance: Acceptance::NotLarger,
    },
];

fn gs_compress(profile: &GsProfile) -> EngineCandidate {
    let args = vec![
        "-sDEVICE=pdfwrite".to_string(),
        format!("-dCompatibilityLevel={}", profile.compatibility),
        format!("-dPDFSETTINGS={}", profile.settings),
        "-dDetectDuplicateImages=true".to_string(),
        "-dCompressPages=true".to_string(),
        "-dUseFlateCompression=true".to_string(),
        "-dAutoFilterColorImages=false".to_string(),
        "-dColorImageFilter=/DCTEncode".to_string(),
        format!("-dJPEGQ={}", profile.jpeg_quality),
        format!("-dColorImageResolution={}", profile.resolution),
        "-dDownsampleColorImages=true".to_string(),
        "-dGrayImageFilter=/DCTEncode".to_string(),
        format!("-dGrayImageResolution={}", profile.resolution),
        "-dDownsampleGrayImages=true".to_string(),
        format!("-dMonoImageResolution={}", profile.mono_resolution),
        "-dDownsampleMonoImages=true".to_string(),
        "-dSubsetFonts=true".to_string(),
        "-dCompressFonts=true".to_string(),
        "-dNOPAUSE".to_string(),
        "-dQUIET".to_string(),
        "-dBATCH".to_string(),
        "-sOutputFile={output}".to_string(),
        "{input}".to_string(),
    ];
    EngineCandidate {
        name: format!("ghostscript-{}", profile.name),
        engine: Engine::Ghostscript,
        args,
        timeout: GS_TIMEOUT,
        acceptance: profile.acceptance,
        output: OutputTarget::File("output.pdf".to_string()),
        then: Vec::new(),
    }
}

/// Three Ghostscript profiles of rising aggressiveness, then QPDF, then a
/// LibreOffice re-encode.
pub fn compress() -> Vec<EngineCandidate> {
    let mut list: Vec<EngineCandidate> = GS_PROFILES.iter().map(gs_compress).collect();
    list.push(
        EngineCandidate::new(
            "qpdf",
            Engine::Qpdf,
            &[
                "--optimize-images",
                "--object-streams=generate",
                "--compress-streams=y",
                "--recompress-flate",
                "--normalize-content=y",
                "{input}",
                "{output}",
            ],
            SHORT_TIMEOUT,
        )
        .accept(Acceptance::MinReduction(5.0)),
    );
    // soffice names its output after the input file
    list.push(
        EngineCandidate::new(
            "libreoffice",
            Engine::LibreOffice,
            &["--headless", "--convert-to", "pdf", "--outdir", "{outdir}", "{input}"],
            SHORT_TIMEOUT,
        )
        .accept(Acceptance::NotLarger)
        .output(OutputTarget::File(super::INPUT_FILE.to_string())),
    );
    list
}

// ── Split / Merge ────────────────────────────────────────────────────────

pub fn split() -> Vec<EngineCandidate> {
    vec![
        EngineCandidate::new(
            "ghostscript",
            Engine::Ghostscript,
            &[
                "-sDEVICE=pdfwrite",
                "-dNOPAUSE",
                "-dQUIET",
                "-dBATCH",
                "-dSAFER",
                "-sPageList={pages}",
                "-sOutputFile={output}",
                "{input}",
            ],
            SHORT_TIMEOUT,
        ),
        EngineCandidate::new(
            "qpdf",
            Engine::Qpdf,
            &["{input}", "--pages", "{input}", "{pages}", "--", "{output}"],
            SHORT_TIMEOUT,
        ),
    ]
}

pub fn merge() -> Vec<EngineCandidate> {
    vec![
        EngineCandidate::new(
            "ghostscript",
            Engine::Ghostscript,
            &[
                "-sDEVICE=pdfwrite",
                "-dNOPAUSE",
                "-dQUIET",
                "-dBATCH",
                "-dSAFER",
                "-sOutputFile={output}",
                "{inputs}",
            ],
            GS_TIMEOUT,
        ),
        EngineCandidate::new(
            "qpdf",
            Engine::Qpdf,
            &["--empty", "--pages", "{inputs}", "--", "{output}"],
            GS_TIMEOUT,
        ),
    ]
}

// ── Encrypt ──────────────────────────────────────────────────────────────

pub fn encrypt() -> Vec<EngineCandidate> {
    vec![
        EngineCandidate::new(
            "pdftk",
            Engine::Pdftk,
            &["{input}", "output", "{output}", "user_pw", "{password}"],
            SHORT_TIMEOUT,
        ),
        EngineCandidate::new(
            "qpdf",
            Engine::Qpdf,
            &["--encrypt", "{password}", "{password}", "256", "--", "{input}", "{output}"],
            SHORT_TIMEOUT,
        ),
    ]
}

// ── Document conversion ──────────────────────────────────────────────

/// Word (`.doc`/`.docx`) to PDF through LibreOffice.
pub fn word_to_pdf() -> Vec<EngineCandidate> {
    vec![EngineCandidate::new(
        "libreoffice",
        Engine::LibreOffice,
        &[
            "--headless",
            "--invisible",
            "--nodefault",
            "--nolockcheck",
            "--nologo",
            "--norestore",
            "--convert-to",
            "pdf",
            "--outdir",
            "{outdir}",
            "{input}",
        ],
        CONVERT_TIMEOUT,
    )
    .output(OutputTarget::File(super::INPUT_FILE.to_string()))]
}

/// PDF to DOCX: a direct Writer import, then a detour through ODT
/// for files the direct filter refuses.
pub fn pdf_to_docx() -> Vec<EngineCandidate> {
    let docx = OutputTarget::File("input.docx".to_string());
    vec![
        EngineCandidate::new(
            "libreoffice-docx",
            Engine::LibreOffice,
            &[
                "--headless",
                "--infilter=writer_pdf_import",
                "--convert-to",
                DOCX_FILTER,
                "--outdir",
                "{outdir}",
                "{input}",
            ],
            CONVERT_TIMEOUT,
        )
        .output(docx.clone()),
        EngineCandidate::new(
            "libreoffice-odt",
            Engine::LibreOffice,
            &[
                "--headless",
                "--infilter=writer_pdf_import",
                "--convert-to",
                "odt",
                "--outdir",
                "{outdir}",
                "{input}",
            ],
            CONVERT_TIMEOUT,
        )
        .then(&[
            "--headless",
            "--convert-to",
            DOCX_FILTER,
            "--outdir",
            "{outdir}",
            "{outdir}/input.odt",
        ])
        .output(docx),
    ]
}

// ── Text extraction ──────────────────────────────────────────────────────

pub fn extract_text() -> Vec<EngineCandidate> {
    vec![
        EngineCandidate::new(
            "pdftotext",
            Engine::Pdftotext,
            &["-layout", "-enc", "UTF-8", "{input}", "{output}"],
            SHORT_TIMEOUT,
        )
        .accept(Acceptance::AnyOutput)
        .output(OutputTarget::File("output.txt".to_string())),
        EngineCandidate::new(
            "ghostscript-txtwrite",
            Engine::Ghostscript,
            &[
                "-sDEVICE=txtwrite",
                "-dNOPAUSE",
                "-dQUIET",
                "-dBATCH",
                "-dSAFER",
                "-sOutputFile={output}",
                "{input}",
            ],
            SHORT_TIMEOUT,
        )
        .accept(Acceptance::AnyOutput)
        .output(OutputTarget::File("output.txt".to_string())),
    ]
}

pub fn page_count() -> Vec<EngineCandidate> {
    vec![
        EngineCandidate::new("qpdf", Engine::Qpdf, &["--show-npages", "{input}"], SHORT_TIMEOUT)
            .output(OutputTarget::Stdout),
        EngineCandidate::new("pdfinfo", Engine::Pdfinfo, &["{input}"], SHORT_TIMEOUT)
            .output(OutputTarget::Stdout),
    ]
}

// ── Template rendering ───────────────────────────────────────────────────

/// Values substituted into an argument template.
#[derive(Debug, Clone, Default)]
pub struct TemplateValues {
    pub inputs: Vec<String>,
    pub output: String,
    pub outdir: String,
    pub pages: Option<String>,
    pub password: Option<String>,
}

/// Expand a candidate's argument template.
///
/// A whole-argument `{inputs}` becomes one argument per input. Unknown
/// placeholders are left as written.
pub fn render_args(template: &[String], values: &TemplateValues) -> Vec<String> {
    let mut out = Vec::with_capacity(template.len() + values.inputs.len());
    for arg in template {
        if arg == "{inputs}" {
            out.extend(values.inputs.iter().cloned());
        } else {
            out.push(render_arg(arg, values));
        }
    }
    out
}

fn render_arg(arg: &str, values: &TemplateValues) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open..];
        let Some(close) = after.find('}') else {
            out.push_str(after);
            return out;
        };
        let key = &after[1..close];
        match lookup(key, values) {
            Some(value) => out.push_str(value),
            None => out.push_str(&after[..=close]),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

fn lookup<'a>(key: &str, values: &'a TemplateValues) -> Option<&'a str> {
    match key {
        "input" => values.inputs.first().map(String::as_str),
        "output" => Some(&values.output),
        "outdir" => Some(&values.outdir),
        "pages" => values.pages.as_deref(),
        "password" => values.password.as_deref(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> TemplateValues {
        TemplateValues {
            inputs: vec!["/w/a.pdf".into(), "/w/b.pdf".into()],
            output: "/w/attempt-1/output.pdf".into(),
            outdir: "/w/attempt-1".into(),
            pages: Some("1-3,5".into()),
            password: Some("{output}".into()),
        }
    }

    #[test]
    fn compress_order_and_thresholds() {
        let names: Vec<_> = compress().into_iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            [
                "ghostscript-balanced",
                "ghostscript-aggressive",
                "ghostscript-ultra",
                "qpdf",
                "libreoffice"
            ]
        );
        let list = compress();
        assert_eq!(list[0].acceptance, Acceptance::MinReduction(20.0));
        assert_eq!(list[2].acceptance, Acceptance::NotLarger);
        assert_eq!(list[3].acceptance, Acceptance::MinReduction(5.0));
        assert_eq!(list[0].timeout, Duration::from_secs(60));
        assert_eq!(list[3].timeout, Duration::from_secs(30));
    }

    #[test]
    fn gs_profile_flags() {
        let ultra = &compress()[2];
        assert!(ultra.args.contains(&"-dJPEGQ=30".to_string()));
        assert!(ultra.args.contains(&"-dColorImageResolution=72".to_string()));
        assert!(ultra.args.contains(&"-dCompatibilityLevel=1.4".to_string()));
        assert_eq!(ultra.args.last().map(String::as_str), Some("{input}"));
    }

    #[test]
    fn renders_prefixed_placeholders() {
        let args = render_args(&split()[0].args, &values());
        assert!(args.contains(&"-sPageList=1-3,5".to_string()));
        assert!(args.contains(&"-sOutputFile=/w/attempt-1/output.pdf".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/w/a.pdf"));
    }

    #[test]
    fn inputs_expand_to_separate_arguments() {
        let args = render_args(&merge()[1].args, &values());
        assert_eq!(
            args,
            ["--empty", "--pages", "/w/a.pdf", "/w/b.pdf", "--", "/w/attempt-1/output.pdf"]
        );
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let args = render_args(&encrypt()[0].args, &values());
        assert_eq!(args[4], "{output}");
    }

    #[test]
    fn unknown_and_unclosed_placeholders_pass_through() {
        let v = values();
        assert_eq!(render_arg("{nope}-x", &v), "{nope}-x");
        assert_eq!(render_arg("a{b", &v), "a{b");
    }

    #[test]
    fn extraction_takes_empty_text_layers() {
        assert!(extract_text().iter().all(|c| c.acceptance == Acceptance::AnyOutput));
        assert_eq!(compress()[0].acceptance, Acceptance::MinReduction(20.0));
    }

    #[test]
    fn word_to_pdf_is_a_headless_libreoffice_export() {
        let list = word_to_pdf();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].engine, Engine::LibreOffice);
        assert!(list[0].args.windows(2).any(|w| w == ["--convert-to", "pdf"]));
        assert!(list[0].args.contains(&"--norestore".to_string()));
        assert_eq!(list[0].timeout, Duration::from_secs(120));
    }

    #[test]
    fn pdf_to_docx_falls_back_through_odt() {
        let list = pdf_to_docx();
        let names: Vec<_> = list.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["libreoffice-docx", "libreoffice-odt"]);
        assert!(list[0].then.is_empty());
        assert_eq!(list[1].then.len(), 1);

        let step = render_args(&list[1].then[0], &values());
        assert_eq!(step.last().map(String::as_str), Some("/w/attempt-1/input.odt"));
        assert!(step.contains(&"docx:MS Word 2007 XML".to_string()));
        assert!(list.iter().all(|c| c.output == OutputTarget::File("input.docx".into())));
    }

    #[test]
    fn libreoffice_output_named_after_input() {
        let lo = compress().pop().unwrap();
        assert_eq!(lo.output, OutputTarget::File(crate::engines::INPUT_FILE.into()));
    }
}
