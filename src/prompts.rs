//! Instruction text sent with each kind of generation.

use crate::action::ActionKind;
use crate::api::Prompt;
use crate::generation::GenerationRequest;

/// The two preamble lines every mode must leave untouched.
const FONT_LINES: &str = "`\\newfontfamily\\gujaratifont[Script=Gujarati]{AMDAVAD UNICODE}`\n\
`\\newcommand{\\guj}[1]{{\\gujaratifont #1}}`";

fn preserve_font_lines() -> String {
    format!(
        "IMPORTANT: these two preamble lines enable Gujarati typesetting. Never alter, remove or comment them out; keep them verbatim:\n{}",
        FONT_LINES
    )
}

fn update_system() -> String {
    format!(
        "You are an expert LaTeX Beamer presentation editor specializing in Gujarati content.\n\
You receive an existing Beamer document (set up for Gujarati with \\usepackage{{fontspec}} and a \\guj{{}} command) and an instruction from the user.\n\
Apply the instruction and return the COMPLETE, updated, compilable document.\n\
Every piece of Gujarati text MUST be wrapped in \\guj{{}}, e.g. \\frametitle{{\\guj{{પ્રકરણ ૧}}}} or \\guj{{આ ગુજરાતીમાં લખાણ છે.}}. Mathematics stays in standard LaTeX.\n\
Keep the existing preamble and document structure unless the user explicitly asks to change them.\n\
{}\n\
If the instruction needs another package, add a common one that works with fontspec/xelatex to the preamble.\n\
Return the entire document from \\documentclass to \\end{{document}}, never just the changed part.\n\
Output ONLY raw LaTeX: no explanations and no markdown fences.",
        preserve_font_lines()
    )
}

fn rewrite_system() -> String {
    format!(
        "You are an expert LaTeX editor working on Gujarati content inside a Beamer presentation.\n\
You receive a selected LaTeX snippet, the full document for context (set up for Gujarati with \\guj{{}}), and an instruction that applies ONLY to the snippet.\n\
Rewrite ONLY the selected snippet. If the result contains Gujarati text, wrap it in \\guj{{}}; for example, rewriting \"Hello\" as a Gujarati greeting gives \"\\guj{{નમસ્તે}}\".\n\
Mathematics stays in standard LaTeX. The snippet must remain valid LaTeX and fit its surroundings.\n\
The preamble contains these lines, which the document depends on:\n{}\n\
Output ONLY the rewritten snippet: never the full document, no explanations, no markdown fences.\n\
If the instruction is to delete the snippet, return an empty response.",
        FONT_LINES
    )
}

fn image_system() -> String {
    format!(
        "You are an expert LaTeX Beamer presentation creator who turns images into GUJARATI slides.\n\
The presentation uses \\usepackage{{fontspec}} and a \\guj{{}} command for Gujarati text.\n\
You receive the current Beamer document, an image, and an optional instruction about the image.\n\
1. Analyze the image.\n\
2. Follow the instruction; if it is empty or generic, describe the image and its content in Gujarati.\n\
3. Write new Beamer content (usually a new frame) from the image. All text derived from it MUST be Gujarati inside \\guj{{}}, e.g. \\frametitle{{\\guj{{આકૃતિનું વર્ણન}}}}.\n\
4. Insert it into the existing document, normally as a new \\begin{{frame}} ... \\end{{frame}} block.\n\
5. Return the COMPLETE, updated, compilable document.\n\
Keep the existing preamble.\n\
{}\n\
To show the image itself use a placeholder such as \\includegraphics[width=0.8\\textwidth]{{placeholder_image.png}}.\n\
Output ONLY raw LaTeX for the entire document.",
        preserve_font_lines()
    )
}

fn pdf_system() -> String {
    format!(
        "You are an expert LaTeX Beamer presentation creator who converts PDF documents (often Gujarati text with mathematics) into GUJARATI Beamer slides.\n\
The presentation uses \\usepackage{{fontspec}} and a \\guj{{}} command for all Gujarati text.\n\
You receive the current Beamer document, a PDF, and an optional instruction about it.\n\
1. Read the PDF and tell apart Gujarati text, English text and formulas.\n\
2. Follow the instruction, or summarize and extract the key points when there is none.\n\
3. Gujarati content (titles, body, lists, summaries) MUST be wrapped in \\guj{{}}, e.g. \\frametitle{{\\guj{{પીડીએફ સારાંશ}}}}.\n\
4. Transcribe formulas into standard LaTeX math environments.\n\
5. Add the result to the existing document, typically as new frames.\n\
6. Return the COMPLETE, updated, compilable document.\n\
Keep the existing preamble.\n\
{}\n\
Figures in the PDF may be described in Gujarati or replaced with an \\includegraphics placeholder.\n\
Output ONLY raw LaTeX for the entire document, with no explanations or markdown.",
        preserve_font_lines()
    )
}

const IMAGE_FALLBACK: &str = "No specific instruction. Analyze the image and generate a relevant new frame in Gujarati based on it, integrating it into the current LaTeX code. Provide a descriptive frame title in Gujarati using \\guj{}.";

const PDF_FALLBACK: &str = "No specific instruction. Analyze the PDF. Extract key information, summarize, or create relevant frames in Gujarati. Transcribe Gujarati text using \\guj{} and mathematical formulas accurately. Integrate into the current LaTeX code.";

fn or_fallback<'a>(instruction: &'a str, fallback: &'a str) -> &'a str {
    if instruction.trim().is_empty() {
        fallback
    } else {
        instruction
    }
}

/// Builds the provider prompt for a request. `system_suffix` comes from the provider config.
pub fn build(request: &GenerationRequest, system_suffix: Option<&str>) -> Prompt {
    let (system, user) = match request.kind {
        ActionKind::WholeDocumentUpdate => (
            update_system(),
            format!(
                "Existing Gujarati LaTeX Code:\n{}\n\nUser instruction for modification (primarily in Gujarati context):\n{}",
                request.document, request.instruction
            ),
        ),
        ActionKind::SelectionRewrite => (
            rewrite_system(),
            format!(
                "Full Gujarati LaTeX Document Context:\n{}\n\nSelected LaTeX snippet to modify:\n{}\n\nUser instruction for the snippet (assume Gujarati context if applicable):\n{}",
                request.document,
                request.snippet.as_deref().unwrap_or_default(),
                request.instruction
            ),
        ),
        ActionKind::ImageGeneration => (
            image_system(),
            format!(
                "Current Gujarati LaTeX Code:\n{}\n\nUser instruction for image (generate Gujarati content):\n{}",
                request.document,
                or_fallback(&request.instruction, IMAGE_FALLBACK)
            ),
        ),
        ActionKind::PdfGeneration => (
            pdf_system(),
            format!(
                "Current Gujarati LaTeX Code:\n{}\n\nUser instruction for PDF (generate Gujarati content, transcribe math):\n{}",
                request.document,
                or_fallback(&request.instruction, PDF_FALLBACK)
            ),
        ),
    };

    let system = match system_suffix.map(str::trim).filter(|s| !s.is_empty()) {
        Some(suffix) => format!("{}\n\n{}", system, suffix),
        None => system,
    };

    Prompt {
        system,
        user,
        media: request.media.clone(),
    }
}
