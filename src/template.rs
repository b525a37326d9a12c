//! Starting document for a new presentation.

/// A compilable 16:9 Beamer deck (xelatex) with Gujarati font setup, a title
/// frame and one introduction frame.
pub const INITIAL_DOCUMENT: &str = r"\documentclass[aspectratio=169]{beamer}
\usetheme{Warsaw}

% Basic packages
\usepackage{amsmath, amssymb, amsthm}
\usepackage{graphicx}
\usepackage{hyperref}

\usepackage{fontspec}

% Gujarati font; any installed Gujarati font can be swapped in here.
\newfontfamily\gujaratifont[Script=Gujarati]{AMDAVAD UNICODE}
\newcommand{\guj}[1]{{\gujaratifont #1}}

\usepackage{geometry}
\usepackage{fancyhdr}
\usepackage{tcolorbox}
\usepackage{xcolor}
\usepackage{gensymb}
\usepackage{tikz}
\usepackage{pgfplots}
\pgfplotsset{compat=1.17}
\usepackage{multicol}
\usepackage{array}

\setbeamertemplate{theorems}[numbered]
\theoremstyle{definition}
\newtheorem{exercise}{\guj{વ્યાયામ}}
\newtheorem{prob}{\guj{સમસ્યા}}
\newtheorem{exmp}{\guj{ઉદાહરણ}}
\theoremstyle{remark}
\newtheorem*{remark}{\guj{નોંધ}}
\newcommand{\cosec}{\text{cosec}}

\title{\guj{મારી રજૂઆત}}
\author{\guj{એઆઈ સહાયક}}
\date{\today}

\begin{document}

\begin{frame}
  \titlepage
\end{frame}

\begin{frame}
  \frametitle{\guj{પ્રસ્તાવના}}
  \guj{આ પ્રથમ સ્લાઇડ છે. અહીંયા તમે તમારી રજૂઆત માટે ગુજરાતીમાં લખાણ ઉમેરી શકો છો.}
\end{frame}

% \guj{વપરાશકર્તાના પ્રોમ્પ્ટના આધારે નીચે સામગ્રી ઉમેરો}

\end{document}
";

/// Returns the lines of `document` that the Gujarati setup depends on and
/// that are missing from it.
pub fn missing_font_lines(document: &str) -> Vec<&'static str> {
    FONT_SETUP_LINES
        .iter()
        .copied()
        .filter(|line| !document.lines().any(|l| l.trim() == *line))
        .collect()
}

const FONT_SETUP_LINES: [&str; 2] = [
    r"\newfontfamily\gujaratifont[Script=Gujarati]{AMDAVAD UNICODE}",
    r"\newcommand{\guj}[1]{{\gujaratifont #1}}",
];
