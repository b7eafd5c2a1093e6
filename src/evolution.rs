//! Evolution mechanics: mutation gate, speciation, selection and mating.

use crate::config::{Config, MutationConfig, PopulationConfig, SpeciationConfig};
use crate::context::NeatContext;
use crate::critter::Critter;
use crate::error::NeatResult;
use crate::hooks::Hooks;
use crate::neural::crossover;
use crate::neural::mutations::{self, MutationTally};
use crate::population::Population;
use rand::Rng;
use std::collections::HashSet;
use std::fmt;

/// Evolution engine producing each next generation
#[derive(Clone, Debug)]
pub struct Evolver {
    pub population: PopulationConfig,
    pub mutation: MutationConfig,
    pub speciation: SpeciationConfig,
}

/// How a slot of the next generation gets filled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Plan {
    Elite(usize),
    Mate(usize, usize),
    Carryover(usize),
}

impl Evolver {
    /// Create evolution engine from config
    pub fn from_config(config: &Config) -> Self {
        Self {
            population: config.population.clone(),
            mutation: config.mutation.clone(),
            speciation: config.speciation.clone(),
        }
    }

    /// Mutate every non-elite critter in place, unless the mate-only roll
    /// skips the whole generation (`None`).
    pub fn mutate(
        &self,
        critters: &mut [Critter],
        ctx: &mut NeatContext,
    ) -> NeatResult<Option<MutationTally>> {
        if ctx.chance(self.mutation.mate_only_prob) {
            log::debug!("mate-only generation, no mutation");
            return Ok(None);
        }

        let mut tally = MutationTally::default();
        for critter in critters.iter_mut().filter(|c| !c.elite) {
            tally.absorb(mutations::mutate_critter(critter, &self.mutation, ctx)?);
        }
        log::debug!(
            "mutations: perturbed {} changed {} neurons {} genes {} disabled {} reenabled {}",
            tally.perturbed,
            tally.changed,
            tally.neurons_added,
            tally.genes_added,
            tally.disabled,
            tally.reenabled
        );
        Ok(Some(tally))
    }

    /// Greedy single-pass clustering against each species' first member.
    /// Species smaller than `smallest_species` are merged into the mutt group.
    pub fn speciate(&self, critters: &[Critter]) -> Vec<Species> {
        let mut species: Vec<Species> = Vec::new();

        for (idx, critter) in critters.iter().enumerate() {
            let home = species.iter_mut().find(|sp| match sp.key {
                SpeciesKey::Representative(rep) => {
                    critter.compare(&critters[rep], &self.speciation)
                        < self.speciation.compatibility_threshold
                }
                SpeciesKey::Mutt => false,
            });
            match home {
                Some(sp) => sp.members.push(idx),
                None => species.push(Species::new(idx)),
            }
        }

        let smallest = self.speciation.smallest_species;
        let (mut kept, small): (Vec<Species>, Vec<Species>) =
            species.into_iter().partition(|sp| sp.members.len() >= smallest);
        let mutts: Vec<usize> = small.into_iter().flat_map(|sp| sp.members).collect();
        if !mutts.is_empty() {
            kept.push(Species {
                key: SpeciesKey::Mutt,
                members: mutts,
                fitness: 0.0,
            });
        }

        for sp in kept.iter_mut() {
            sp.evaluate(critters);
        }
        log::debug!(
            "species: {}",
            kept.iter()
                .map(|sp| sp.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        kept
    }

    /// Sort members of every species better-first
    pub fn rank(&self, species: &mut [Species], critters: &[Critter], hooks: &Hooks) {
        for sp in species.iter_mut() {
            sp.members.sort_by(|&a, &b| {
                hooks.compare_fitness(critters[a].fitness, critters[b].fitness)
            });
        }
    }

    /// Build the next generation: elites, then random pairs from each
    /// species' survivors, then carry-overs to fill, truncated to size.
    pub fn evolve(
        &self,
        population: &Population,
        hooks: &Hooks,
        ctx: &mut NeatContext,
    ) -> NeatResult<Population> {
        let critters = &population.critters;
        let mut species = if population.species.is_empty() {
            self.speciate(critters)
        } else {
            population.species.clone()
        };
        self.rank(&mut species, critters, hooks);

        let plans = self.plan(&species, critters, hooks, ctx);

        let mut used: HashSet<String> = HashSet::with_capacity(plans.len());
        let mut next = Vec::with_capacity(plans.len());
        for plan in plans {
            let mut child = match plan {
                Plan::Elite(i) => {
                    let mut elite = critters[i].duplicate(critters[i].name.clone());
                    elite.elite = true;
                    elite
                }
                Plan::Carryover(i) => critters[i].duplicate(critters[i].name.clone()),
                Plan::Mate(a, b) => crossover::sex(
                    &critters[a],
                    &critters[b],
                    |x, y| hooks.compare_fitness(x, y),
                    ctx,
                )?,
            };
            if !used.insert(child.name.clone()) {
                child.name = ctx.random_name();
                used.insert(child.name.clone());
            }
            next.push(child);
        }

        Ok(Population::with_critters(population.generation + 1, next))
    }

    fn plan(
        &self,
        species: &[Species],
        critters: &[Critter],
        hooks: &Hooks,
        ctx: &mut NeatContext,
    ) -> Vec<Plan> {
        let elites = self.population.effective_elite_count();
        let survival = self.population.survival_threshold;
        let survival_min = self.population.survival_minimum_per_species;
        let target = self.population.population_size;

        let mut elite_pool: Vec<usize> = Vec::new();
        let mut matings: Vec<Plan> = Vec::new();
        for sp in species {
            let size = sp.members.len();
            let crem = ((size as f64 * survival).ceil() as usize).max(survival_min);
            if crem <= survival_min {
                log::debug!("minimum per species hit for {} ({})", sp.key, survival_min);
            }
            elite_pool.extend(sp.members.iter().take(elites));

            let eligible = &sp.members[..crem.min(size)];
            if eligible.is_empty() {
                continue;
            }
            for _ in 0..crem {
                let a = eligible[ctx.rng().gen_range(0..eligible.len())];
                let b = eligible[ctx.rng().gen_range(0..eligible.len())];
                matings.push(Plan::Mate(a, b));
            }
        }

        elite_pool.sort_by(|&a, &b| hooks.compare_fitness(critters[a].fitness, critters[b].fitness));
        let mut plans: Vec<Plan> = elite_pool
            .into_iter()
            .take(elites)
            .map(Plan::Elite)
            .collect();
        plans.extend(matings);

        if plans.len() < target && !critters.is_empty() {
            let missing = target - plans.len();
            plans.extend((0..missing).map(|i| Plan::Carryover(i % critters.len())));
        }
        plans.truncate(target);
        plans
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeciesKey {
    /// Index of the founding member
    Representative(usize),
    /// Catch-all for species too small to stand alone
    Mutt,
}

impl fmt::Display for SpeciesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeciesKey::Representative(idx) => write!(f, "#{}", idx),
            SpeciesKey::Mutt => f.write_str("mutt"),
        }
    }
}

/// Critters compatible with one representative, by population index
#[derive(Clone, Debug)]
pub struct Species {
    pub key: SpeciesKey,
    pub members: Vec<usize>,
    /// Mean member fitness
    pub fitness: f64,
}

impl Species {
    pub fn new(representative: usize) -> Self {
        Self {
            key: SpeciesKey::Representative(representative),
            members: vec![representative],
            fitness: 0.0,
        }
    }

    /// Recompute mean fitness
    pub fn evaluate(&mut self, critters: &[Critter]) {
        let total: f64 = self
            .members
            .iter()
            .filter_map(|&i| critters.get(i))
            .map(|c| c.fitness)
            .sum();
        self.fitness = if self.members.is_empty() {
            0.0
        } else {
            total / self.members.len() as f64
        };
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {:.4}", self.key, self.members.len(), self.fitness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural::gene::Gene;

    fn context(seed: u64) -> NeatContext {
        let mut config = Config::default();
        config.run.seed = Some(seed);
        config.population.population_size = 10;
        NeatContext::new(config).unwrap()
    }

    /// Critter whose single gene i1 -> out has the given weight. Every such
    /// critter shares innovation 1, so their distance is c3 * |w1 - w2|.
    fn weighted(ctx: &mut NeatContext, weight: f64, fitness: f64) -> Critter {
        let mut critter = Critter::new(ctx, true);
        critter
            .genotypes
            .get_mut("main")
            .unwrap()
            .neucleate(true, vec![Gene::new(1, "i1", "out", weight)]);
        critter.fitness = fitness;
        critter
    }

    fn evolver(threshold: f64, smallest: usize) -> Evolver {
        let mut config = Config::default();
        config.speciation = SpeciationConfig {
            compatibility_threshold: threshold,
            excess_coefficient: 1.0,
            disjoint_coefficient: 1.0,
            weight_coefficient: 1.0,
            smallest_species: smallest,
        };
        config.population.population_size = 10;
        Evolver::from_config(&config)
    }

    #[test]
    fn test_speciation_threshold_boundary() {
        let mut ctx = context(1);
        let eps = 1e-6;
        let evolver = evolver(1.0, 1);

        let same = vec![weighted(&mut ctx, 0.0, 0.0), weighted(&mut ctx, 1.0 - eps, 0.0)];
        assert_eq!(evolver.speciate(&same).len(), 1);

        let apart = vec![weighted(&mut ctx, 0.0, 0.0), weighted(&mut ctx, 1.0 + eps, 0.0)];
        assert_eq!(evolver.speciate(&apart).len(), 2);

        let exact = vec![weighted(&mut ctx, 0.0, 0.0), weighted(&mut ctx, 1.0, 0.0)];
        assert_eq!(evolver.speciate(&exact).len(), 2);
    }

    #[test]
    fn test_small_species_become_mutts() {
        let mut ctx = context(2);
        let evolver = evolver(0.5, 2);
        let critters = vec![
            weighted(&mut ctx, 0.0, 1.0),
            weighted(&mut ctx, 0.1, 3.0),
            weighted(&mut ctx, 5.0, 2.0),
            weighted(&mut ctx, 10.0, 4.0),
        ];

        let species = evolver.speciate(&critters);
        assert_eq!(species.len(), 2);
        assert_eq!(species[0].key, SpeciesKey::Representative(0));
        assert_eq!(species[0].members, vec![0, 1]);
        assert_eq!(species[0].fitness, 2.0);
        assert_eq!(species[1].key, SpeciesKey::Mutt);
        assert_eq!(species[1].members, vec![2, 3]);
        assert_eq!(species[1].fitness, 3.0);
    }

    #[test]
    fn test_rank_sorts_better_first() {
        let mut ctx = context(3);
        let evolver = evolver(100.0, 1);
        let critters = vec![
            weighted(&mut ctx, 0.0, 0.9),
            weighted(&mut ctx, 0.0, 0.1),
            weighted(&mut ctx, 0.0, 0.5),
        ];
        let mut species = evolver.speciate(&critters);
        evolver.rank(&mut species, &critters, &Hooks::new());
        assert_eq!(species[0].members, vec![1, 2, 0]);
    }

    #[test]
    fn test_evolve_keeps_size_elites_and_unique_names() {
        let mut ctx = context(4);
        let evolver = evolver(100.0, 1);
        let critters: Vec<Critter> = (0..6)
            .map(|i| weighted(&mut ctx, i as f64 * 0.1, i as f64))
            .collect();
        let best = critters[0].name.clone();
        let population = Population::with_critters(3, critters);

        let next = evolver.evolve(&population, &Hooks::new(), &mut ctx).unwrap();
        assert_eq!(next.generation, 4);
        assert_eq!(next.critters.len(), 10);
        assert_eq!(next.critters[0].name, best);

        let names: HashSet<&str> = next.critters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn test_elites_survive_next_mutation_unchanged() {
        let mut ctx = context(6);
        let mut evolver = evolver(100.0, 1);
        evolver.mutation.mate_only_prob = 0.0;
        evolver.mutation.perturb_gene_weights_prob = 1.0;
        let critters: Vec<Critter> = (0..6)
            .map(|i| weighted(&mut ctx, i as f64 * 0.1, i as f64))
            .collect();
        let population = Population::with_critters(0, critters);

        let mut next = evolver.evolve(&population, &Hooks::new(), &mut ctx).unwrap();
        let elites: Vec<&Critter> = next.critters.iter().filter(|c| c.elite).collect();
        assert_eq!(elites.len(), 2);
        assert_eq!(elites[0].name, population.critters[0].name);
        assert_eq!(elites[1].name, population.critters[1].name);

        let tally = next.mutate(&evolver, &mut ctx).unwrap().unwrap();
        // one enabled gene per non-elite critter
        assert_eq!(tally.perturbed, 8);
        for (elite, parent) in next.critters[..2].iter().zip(&population.critters[..2]) {
            assert!(elite.elite);
            assert_eq!(elite.genotypes["main"].genes, parent.genotypes["main"].genes);
        }
    }

    #[test]
    fn test_mate_only_skips_mutation() {
        let mut ctx = context(5);
        let mut config = Config::default();
        config.mutation.mate_only_prob = 1.0;
        let evolver = Evolver::from_config(&config);

        let mut critters = vec![Critter::new(&mut ctx, false)];
        let before = critters[0].genotypes["main"].genes.clone();
        assert!(evolver.mutate(&mut critters, &mut ctx).unwrap().is_none());
        assert_eq!(critters[0].genotypes["main"].genes, before);

        config.mutation.mate_only_prob = 0.0;
        config.mutation.perturb_gene_weights_prob = 1.0;
        let evolver = Evolver::from_config(&config);
        let tally = evolver.mutate(&mut critters, &mut ctx).unwrap().unwrap();
        assert_eq!(tally.perturbed, 3);
    }
}
