use std::{ fmt, num::NonZeroUsize };

const WORD_BITS: usize = u64::BITS as usize;

/// A set of logical processors a process may be scheduled on.
///
/// Bits are stored in 64-bit words so hosts with more than 64 processors are
/// represented exactly; platform code decides how much of it the OS accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityMask {
    words: Vec<u64>,
}

impl AffinityMask {
    /// Mask covering processors `0..processors`, and nothing above.
    pub fn all(processors: NonZeroUsize) -> Self {
        let processors = processors.get();
        let mut words = vec![u64::MAX; processors / WORD_BITS];
        let rest = processors % WORD_BITS;
        if rest != 0 {
            words.push((1u64 << rest) - 1);
        }
        Self { words }
    }

    pub fn is_set(&self, cpu: usize) -> bool {
        self.words
            .get(cpu / WORD_BITS)
            .map_or(false, |&word| word & (1u64 << (cpu % WORD_BITS)) != 0)
    }

    /// Number of processors in the mask.
    pub fn count(&self) -> usize {
        self.words
            .iter()
            .map(|word| word.count_ones() as usize)
            .sum()
    }

    /// Processors in the mask, in ascending order.
    pub fn cpus(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(index, &word)| {
                (0..WORD_BITS)
                    .filter(move |bit| word & (1u64 << bit) != 0)
                    .map(move |bit| index * WORD_BITS + bit)
            })
    }

    /// The numeric mask value, if every set bit fits in 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        match self.words.as_slice() {
            [] => Some(0),
            [low, rest @ ..] if rest.iter().all(|&word| word == 0) => Some(*low),
            _ => None,
        }
    }

    /// The lowest 64 processors of the mask.
    pub fn low_word(&self) -> u64 {
        self.words.first().copied().unwrap_or(0)
    }
}

impl fmt::Display for AffinityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = self.words.iter().rev().skip_while(|&&word| word == 0);
        match words.next() {
            None => write!(f, "0x0"),
            Some(top) => {
                write!(f, "{:#x}", top)?;
                for word in words {
                    write!(f, "{:016x}", word)?;
                }
                Ok(())
            }
        }
    }
}
