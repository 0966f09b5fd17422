use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use indexmap::IndexSet;

use super::{AssetTag, AssetTags, Creation, RenderGraphError, Sharing, Stage};

/// The dependency structure of a render graph and the stages derived from it.
#[derive(Debug, Default)]
pub(crate) struct Topology {
    /// If `dependencies[b].contains(a)`, `a` must run in an earlier stage than `b`.
    pub(crate) dependencies: Vec<Vec<usize>>,
    pub(crate) stages:       Vec<Stage>,
}

impl Topology {
    /// Resolves the dependencies of `tasks`, given as `(name, tags)` in insertion order.
    pub(crate) fn init(
        tasks: &[(&str, &AssetTags)],
        externals: &IndexSet<AssetTag>,
    ) -> Result<Self, RenderGraphError> {
        let producers = collect_producers(tasks, externals)?;
        let dependencies = build_dependencies(tasks, externals, &producers)?;
        scan_cycles(&dependencies, |task| tasks[task].0.to_string())?;
        let stages = build_stages(&dependencies);

        Ok(Self { dependencies, stages })
    }
}

/// Maps each output tag to the tasks producing it, in insertion order.
fn collect_producers<'t>(
    tasks: &[(&'t str, &'t AssetTags)],
    externals: &IndexSet<AssetTag>,
) -> Result<HashMap<&'t AssetTag, Vec<usize>>, RenderGraphError> {
    let mut producers: HashMap<&AssetTag, Vec<usize>> = HashMap::new();
    let mut exclusive: HashMap<&AssetTag, usize> = HashMap::new();

    for (index, &(name, tags)) in tasks.iter().enumerate() {
        for output in &tags.outputs {
            if output.creation == Creation::CreatedExternally && !externals.contains(&output.tag) {
                return Err(RenderGraphError::MissingExternal {
                    task: name.to_string(),
                    tag:  output.tag.clone(),
                });
            }

            let list = producers.entry(&output.tag).or_default();
            let conflict = match output.sharing {
                Sharing::Exclusive => list.first().copied(),
                Sharing::Shared => exclusive.get(&output.tag).copied(),
            };
            if let Some(first) = conflict {
                return Err(RenderGraphError::DuplicateExclusiveOutput {
                    tag:    output.tag.clone(),
                    first:  tasks[first].0.to_string(),
                    second: name.to_string(),
                });
            }

            if output.sharing == Sharing::Exclusive {
                exclusive.insert(&output.tag, index);
            }
            if !list.contains(&index) {
                list.push(index);
            }
        }
    }

    Ok(producers)
}

fn build_dependencies(
    tasks: &[(&str, &AssetTags)],
    externals: &IndexSet<AssetTag>,
    producers: &HashMap<&AssetTag, Vec<usize>>,
) -> Result<Vec<Vec<usize>>, RenderGraphError> {
    let mut dependencies: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); tasks.len()];

    for (index, &(name, tags)) in tasks.iter().enumerate() {
        for tag in &tags.required {
            let found = producers.get(tag).map_or(&[][..], Vec::as_slice);
            let others: Vec<usize> = found.iter().copied().filter(|&dep| dep != index).collect();
            if others.is_empty() && !externals.contains(tag) {
                return Err(RenderGraphError::UnresolvedInput {
                    task: name.to_string(),
                    tag:  tag.clone(),
                });
            }
            dependencies[index].extend(others);
        }

        for tag in &tags.optional {
            if let Some(found) = producers.get(tag) {
                dependencies[index].extend(found.iter().copied().filter(|&dep| dep != index));
            }
        }
    }

    // shared writers of the same asset run in insertion order
    for list in producers.values() {
        for pair in list.windows(2) {
            dependencies[pair[1]].insert(pair[0]);
        }
    }

    Ok(dependencies.into_iter().map(|set| set.into_iter().collect()).collect())
}

fn scan_cycles(
    dependencies: &[Vec<usize>],
    describe_task: impl Fn(usize) -> String,
) -> Result<(), RenderGraphError> {
    let mut remaining: BTreeSet<usize> = (0..dependencies.len()).collect();
    let mut exited = HashSet::new();
    let mut stack = Vec::new();

    while let Some(&task) = remaining.iter().next() {
        scan_cycles_from(dependencies, task, &mut remaining, &mut exited, &mut stack, &describe_task)?;
    }
    Ok(())
}

fn scan_cycles_from(
    dependencies: &[Vec<usize>],
    task: usize,
    remaining: &mut BTreeSet<usize>,
    exited: &mut HashSet<usize>,
    stack: &mut Vec<usize>,
    describe_task: &impl Fn(usize) -> String,
) -> Result<(), RenderGraphError> {
    if exited.contains(&task) {
        return Ok(()); // already scanned
    }

    if !remaining.remove(&task) {
        use fmt::Write;

        let mut message = String::new();
        for &visited in stack.iter().skip_while(|&&visited| visited != task) {
            write!(message, "{} -> ", describe_task(visited)).expect("String write is infallible");
        }
        write!(message, "{}", describe_task(task)).expect("String write is infallible");

        return Err(RenderGraphError::Cycle(message));
    }

    stack.push(task);

    for &dep in &dependencies[task] {
        scan_cycles_from(dependencies, dep, remaining, exited, stack, describe_task)?;
    }

    let popped = stack.pop();
    debug_assert_eq!(Some(task), popped);

    let new_exit = exited.insert(task);
    assert!(new_exit, "exited is inserted recursively but no cycles were detected");
    Ok(())
}

/// Places each task one stage after its latest dependency.
///
/// The graph must be acyclic.
fn build_stages(dependencies: &[Vec<usize>]) -> Vec<Stage> {
    let mut depths: Vec<Option<usize>> = vec![None; dependencies.len()];
    for task in 0..dependencies.len() {
        compute_depth(dependencies, task, &mut depths);
    }

    let mut stages: Vec<Stage> = Vec::new();
    for (task, depth) in depths.into_iter().enumerate() {
        let depth = depth.expect("every depth is computed");
        if stages.len() <= depth {
            stages.resize_with(depth + 1, Stage::default);
        }
        stages[depth].tasks.push(task);
    }
    stages
}

fn compute_depth(dependencies: &[Vec<usize>], task: usize, depths: &mut [Option<usize>]) -> usize {
    if let Some(depth) = depths[task] {
        return depth;
    }

    let depth = dependencies[task]
        .iter()
        .map(|&dep| compute_depth(dependencies, dep, depths) + 1)
        .max()
        .unwrap_or(0);
    depths[task] = Some(depth);
    depth
}
