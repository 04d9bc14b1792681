use pretty_assertions::assert_eq;
use texref::catalog::CommandCatalog;
use texref::context::{ConventionSettings, LabelContext};
use texref::definitions::DefinitionIndex;
use texref::document::Document;
use texref::fileset::FileSet;
use texref::references::{Classifier, FileCommands, ReferenceKind};
use texref::rename::{LabelConvention, RenamePlan};

fn file_set(files: &[(&str, &str)]) -> FileSet {
    let documents = files.iter().map(|(path, source)| Document::parse(*path, *source).unwrap()).collect();
    FileSet::from_documents("/project", documents)
}

/// Build the default collaborators over `set` and run `f` with them.
fn with_convention<T>(set: &FileSet, f: impl FnOnce(&LabelConvention<'_>) -> T) -> T {
    let catalog = CommandCatalog::default();
    let files = FileCommands::new(&catalog);
    let definitions = DefinitionIndex::build(set, &catalog);
    let classifier = Classifier::new(&catalog, &files, &definitions);
    let convention = LabelConvention::new(set, &classifier, ConventionSettings::default());
    f(&convention)
}

fn plans(set: &FileSet) -> Vec<RenamePlan> {
    with_convention(set, |c| {
        c.occurrences()
            .iter()
            .filter_map(|(file, label)| c.propose_rename(*file, label))
            .collect()
    })
}

fn apply(set: &FileSet, plan: &RenamePlan) -> Vec<String> {
    set.stage(&plan.edits).unwrap().into_iter().map(|s| s.contents).collect()
}

#[test]
fn section_label_gets_section_prefix() {
    let set = file_set(&[("main.tex", "\\section{some section}\n\\label{some-section}")]);
    let diagnostics = with_convention(&set, |c| c.check());
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].context, LabelContext::Section(texref::catalog::SectioningLevel::Section));
    assert_eq!(diagnostics[0].expected, "sec:some-section");
}

#[test]
fn listing_option_label_and_references_are_renamed() {
    let source = "\\begin{lstlisting}[label=somelabel]\\end{lstlisting}\n\\ref{somelabel} \\cref{somelabel}";
    let set = file_set(&[("main.tex", source)]);
    let plans = plans(&set);
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].new_name, "lst:somelabel");
    assert_eq!(plans[0].edits.len(), 3);
    assert_eq!(
        apply(&set, &plans[0]),
        vec!["\\begin{lstlisting}[label={lst:somelabel}]\\end{lstlisting}\n\\ref{lst:somelabel} \\cref{lst:somelabel}"]
    );
}

#[test]
fn braced_listing_label_is_slugged() {
    let source = "\\begin{lstlisting}[label={some label}]\\end{lstlisting}\n\\ref{some label}";
    let set = file_set(&[("main.tex", source)]);
    let plans = plans(&set);
    assert_eq!(plans[0].new_name, "lst:some-label");
    assert_eq!(
        apply(&set, &plans[0]),
        vec!["\\begin{lstlisting}[label={lst:some-label}]\\end{lstlisting}\n\\ref{lst:some-label}"]
    );
}

#[test]
fn figure_context_beats_enclosing_section() {
    let source = "\\section{Results}\n\\begin{figure}\\label{some label}\\end{figure}\n\\ref{some label}, \\cref{some label}";
    let set = file_set(&[("main.tex", source)]);
    let plans = plans(&set);
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].new_name, "fig:some-label");
    assert_eq!(
        apply(&set, &plans[0]),
        vec!["\\section{Results}\n\\begin{figure}\\label{fig:some-label}\\end{figure}\n\\ref{fig:some-label}, \\cref{fig:some-label}"]
    );
}

#[test]
fn renames_reach_every_file() {
    let set = file_set(&[
        ("main.tex", "\\chapter{Intro}\\label{intro}"),
        ("a.tex", "\\ref{intro} and \\cref{other,intro}"),
        ("b.tex", "\\autoref{intro}\\ref{introduction}"),
    ]);
    let plans = plans(&set);
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].edits.len(), 4);

    let staged = set.stage(&plans[0].edits).unwrap();
    let contents: Vec<&str> = staged.iter().map(|s| s.contents.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "\\ref{ch:intro} and \\cref{other,ch:intro}",
            "\\autoref{ch:intro}\\ref{introduction}",
            "\\chapter{Intro}\\label{ch:intro}",
        ]
    );
}

#[test]
fn fixed_documents_need_no_further_renames() {
    let source = "\\section{A b}\\label{a b}\\ref{a b}\n\\begin{table}\\label{t}\\end{table}\\cref{t}";
    let set = file_set(&[("main.tex", source)]);
    let fix = with_convention(&set, |c| c.fix_plan());
    assert_eq!(fix.renames.len(), 2);

    let staged = set.stage(&fix.edits()).unwrap();
    let fixed = file_set(&[("main.tex", staged[0].contents.as_str())]);
    assert!(plans(&fixed).is_empty());
    assert!(with_convention(&fixed, |c| c.check()).is_empty());
}

#[test]
fn conventional_documents_are_left_alone() {
    let source = "\\label{anything goes}\n\\section{A}\\label{sec:a}\\ref{sec:a}\n\\begin{figure}\\label{fig:b}\\end{figure}";
    let set = file_set(&[("main.tex", source)]);
    assert!(plans(&set).is_empty());
    assert!(with_convention(&set, |c| c.check()).is_empty());
}

#[test]
fn every_command_yields_references_of_one_kind() {
    let source = "\\newcommand{\\R}{x}\n\\input{a,b} \\cref{x,y} \\url{https://example.org} \\R \\href{u}{t} \\emph{e}";
    let set = file_set(&[("main.tex", source)]);
    let catalog = CommandCatalog::default();
    let files = FileCommands::new(&catalog);
    let definitions = DefinitionIndex::build(&set, &catalog);
    let classifier = Classifier::new(&catalog, &files, &definitions);

    let mut seen = Vec::new();
    for (file, command) in set.commands() {
        let document = set.document(file).unwrap();
        let references = classifier.classify(document, command);
        if let Some(first) = references.first() {
            assert!(references.iter().all(|r| r.kind == first.kind));
            seen.push(first.kind);
        }
    }
    assert!(seen.contains(&ReferenceKind::File));
    assert!(seen.contains(&ReferenceKind::Label));
    assert!(seen.contains(&ReferenceKind::Url));
    assert!(seen.contains(&ReferenceKind::Definition));
}

#[test]
fn braced_label_option_is_renamed_whole() {
    let source = "\\begin{lstlisting}[label={a,b}]\\end{lstlisting}\n\\ref{a}";
    let set = file_set(&[("main.tex", source)]);
    let plans = plans(&set);
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].old_name, "a,b");
    assert_eq!(
        apply(&set, &plans[0]),
        vec!["\\begin{lstlisting}[label={lst:a,b}]\\end{lstlisting}\n\\ref{a}"]
    );
}

#[test]
fn duplicate_label_options_converge() {
    let source = "\\begin{lstlisting}[label=a,label=b]\\end{lstlisting}\n\\ref{a} \\ref{b}";
    let set = file_set(&[("main.tex", source)]);
    let fix = with_convention(&set, |c| c.fix_plan());
    assert_eq!(fix.renames.len(), 1);
    assert_eq!(fix.renames[0].old_name, "a");

    let staged = set.stage(&fix.edits()).unwrap();
    assert_eq!(
        staged[0].contents,
        "\\begin{lstlisting}[label={lst:a},label=b]\\end{lstlisting}\n\\ref{lst:a} \\ref{b}"
    );
    let fixed = file_set(&[("main.tex", staged[0].contents.as_str())]);
    assert!(with_convention(&fixed, |c| c.fix_plan()).renames.is_empty());
}

#[test]
fn blank_labels_are_not_renamed() {
    let set = file_set(&[("main.tex", "\\section{A}\\label{}\\ref{}")]);
    assert!(plans(&set).is_empty());
    assert!(with_convention(&set, |c| c.check()).is_empty());
}
